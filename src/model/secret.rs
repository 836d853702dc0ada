// src/model/secret.rs

//! Records written by other tooling that the controllers read

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{ObjectMeta, Resource};
use crate::error::Error;

/// Secret type Helm v3 uses for release storage
pub const HELM_RELEASE_SECRET_TYPE: &str = "helm.sh/release.v1";

/// Data key holding the encoded release payload
pub const RELEASE_DATA_KEY: &str = "release";

/// A Secret with its data held as raw bytes
///
/// Serialized the way the Kubernetes API writes it (`kubectl get secret -o
/// json`): `data` values are base64 encoded. `stringData` values are accepted
/// as plain text on input and take precedence over `data` entries with the
/// same key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SecretDocument", into = "SecretDocument")]
pub struct Secret {
    pub metadata: ObjectMeta,
    pub secret_type: String,
    pub data: BTreeMap<String, Vec<u8>>,
}

impl Secret {
    pub fn is_helm_release(&self) -> bool {
        self.secret_type == HELM_RELEASE_SECRET_TYPE
    }

    pub fn release_payload(&self) -> Option<&[u8]> {
        self.data.get(RELEASE_DATA_KEY).map(Vec::as_slice)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecretDocument {
    metadata: ObjectMeta,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    secret_type: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    data: BTreeMap<String, String>,
    #[serde(default, skip_serializing)]
    string_data: BTreeMap<String, String>,
}

impl TryFrom<SecretDocument> for Secret {
    type Error = Error;

    fn try_from(doc: SecretDocument) -> Result<Self, Error> {
        let mut data = BTreeMap::new();
        for (key, value) in doc.data {
            let bytes = STANDARD.decode(value.trim()).map_err(|e| {
                Error::ParseError(format!("secret {}: data.{key} is not valid base64: {e}", doc.metadata.name))
            })?;
            data.insert(key, bytes);
        }
        for (key, value) in doc.string_data {
            data.insert(key, value.into_bytes());
        }

        Ok(Self {
            metadata: doc.metadata,
            secret_type: doc.secret_type,
            data,
        })
    }
}

impl From<Secret> for SecretDocument {
    fn from(secret: Secret) -> Self {
        Self {
            metadata: secret.metadata,
            secret_type: secret.secret_type,
            data: secret
                .data
                .into_iter()
                .map(|(key, bytes)| (key, STANDARD.encode(bytes)))
                .collect(),
            string_data: BTreeMap::new(),
        }
    }
}

impl Resource for Secret {
    const KIND: &'static str = "Secret";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigMap {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl Resource for ConfigMap {
    const KIND: &'static str = "ConfigMap";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
