// src/controller/release.rs

//! Release records from Helm storage Secrets
//!
//! Helm v3 keeps one Secret per release revision. Its `release` entry is the
//! release document, JSON encoded, gzip compressed and base64 encoded. Only
//! the live revision is materialized; superseded revisions are skipped.

use crate::compression::decompress_auto;
use crate::error::{Error, Result};
use crate::model::{
    ObjectKey, ObjectMeta, Release, ReleaseSpec, Resource, Secret, labels, set_owner_reference,
};
use crate::store::{OpResult, Store};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, error, info};

use super::Action;

/// Secret label carrying the release name
pub const RELEASE_NAME_LABEL: &str = "name";

/// Decode a Helm release payload
///
/// base64 (standard alphabet, surrounding whitespace ignored), then
/// decompression by magic bytes (gzip, zstd or none), then JSON.
pub fn decode_release(payload: impl AsRef<[u8]>) -> Result<ReleaseSpec> {
    let compressed = STANDARD
        .decode(payload.as_ref().trim_ascii())
        .map_err(|e| Error::DecodeError(format!("invalid base64: {e}")))?;

    let document = decompress_auto(&compressed).map_err(|e| Error::DecodeError(e.to_string()))?;

    serde_json::from_slice(&document)
        .map_err(|e| Error::DecodeError(format!("invalid release document: {e}")))
}

pub struct ReleaseReconciler {
    store: Store,
}

impl ReleaseReconciler {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Materialize the Release held by the Secret at `key`
    ///
    /// Undecodable payloads are logged and dropped; retrying cannot fix them.
    pub fn reconcile(&self, key: &ObjectKey) -> Result<Action> {
        debug!("Reconciling release secret {}", key);

        let Some(secret) = self.store.get::<Secret>(key)? else {
            return Ok(Action::AwaitChange);
        };

        if !secret.is_helm_release() {
            return Ok(Action::AwaitChange);
        }

        let Some(payload) = secret.release_payload() else {
            error!("Secret {} has no release payload", key);
            return Ok(Action::AwaitChange);
        };

        let spec = match decode_release(payload) {
            Ok(spec) => spec,
            Err(e) => {
                error!("Unable to decode secret {}: {}", key, e);
                return Ok(Action::AwaitChange);
            }
        };

        if spec.is_superseded() {
            debug!("Skipping superseded release {} v{} in {}", spec.name, spec.version, key);
            return Ok(Action::AwaitChange);
        }

        let name = secret
            .metadata
            .labels
            .get(RELEASE_NAME_LABEL)
            .map(String::as_str)
            .unwrap_or_default();
        if name.is_empty() {
            debug!("Unable to get release name from secret {}", key);
            return Ok(Action::AwaitChange);
        }

        let seed = Release {
            metadata: ObjectMeta::namespaced(secret.metadata.namespace.clone(), name),
            spec: ReleaseSpec::default(),
        };

        let (release, op) = self.store.create_or_update(&seed, |release| {
            for (k, v) in &secret.metadata.labels {
                if k.starts_with(labels::DOMAIN) {
                    release.metadata.labels.insert(k.clone(), v.clone());
                }
            }
            set_owner_reference(&secret, &mut release.metadata)?;
            release.spec = spec.clone();
            Ok(())
        })?;

        match op {
            OpResult::Created => info!(
                "Created release {} (revision {}, {})",
                release.key(),
                release.spec.version,
                release.spec.status()
            ),
            OpResult::Updated => info!(
                "Updated release {} to revision {} ({})",
                release.key(),
                release.spec.version,
                release.spec.status()
            ),
            OpResult::Unchanged => debug!("Release {} is up to date", release.key()),
        }

        Ok(Action::AwaitChange)
    }
}
