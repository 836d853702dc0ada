// src/commands/release.rs
//! Release and release-secret commands

use super::open_store;
use anyhow::{Context, Result};
use marketplace::controller::decode_release;
use marketplace::model::{ObjectKey, ObjectMeta, Release, ReleaseSpec, Secret};
use marketplace::{LabelSelector, OpResult};
use std::path::Path;
use tracing::info;

const DEFAULT_NAMESPACE: &str = "default";

/// Store a secret read from a JSON document
///
/// The document uses the Kubernetes layout, as printed by
/// `kubectl get secret -o json`: base64 `data`, optional plain `stringData`.
pub fn cmd_secret_import(db_path: &Path, file: &str) -> Result<()> {
    let content =
        std::fs::read_to_string(file).with_context(|| format!("Failed to read secret {}", file))?;
    let imported: Secret = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse secret document {}", file))?;

    if imported.metadata.name.is_empty() {
        anyhow::bail!("Secret document {} has no metadata.name", file);
    }
    let namespace = if imported.metadata.namespace.is_empty() {
        DEFAULT_NAMESPACE.to_string()
    } else {
        imported.metadata.namespace.clone()
    };

    let store = open_store(db_path)?;
    let seed = Secret {
        metadata: ObjectMeta::namespaced(namespace, imported.metadata.name.clone()),
        ..Default::default()
    };
    let (secret, op) = store.create_or_update(&seed, |secret| {
        secret.metadata.labels = imported.metadata.labels.clone();
        secret.secret_type = imported.secret_type.clone();
        secret.data = imported.data.clone();
        Ok(())
    })?;

    info!("Secret {} import: {:?}", secret.metadata.key(), op);
    let verb = match op {
        OpResult::Created => "Imported",
        OpResult::Updated => "Updated",
        OpResult::Unchanged => "Unchanged",
    };
    println!(
        "{} secret: {} (type {})",
        verb,
        secret.metadata.key(),
        if secret.secret_type.is_empty() { "-" } else { secret.secret_type.as_str() }
    );
    Ok(())
}

fn summary(spec: &ReleaseSpec) -> String {
    let chart = spec
        .chart
        .as_ref()
        .and_then(|c| c.metadata.as_ref())
        .map(|m| format!("{}-{}", m.name, m.version))
        .unwrap_or_else(|| "-".to_string());
    format!("revision {}, {}, chart {}", spec.version, spec.status(), chart)
}

/// List releases
pub fn cmd_release_list(db_path: &Path, namespace: Option<&str>) -> Result<()> {
    let store = open_store(db_path)?;
    let selector = LabelSelector::everything();
    let releases: Vec<Release> = match namespace {
        Some(ns) => store.list_namespaced(ns, &selector)?,
        None => store.list(&selector)?,
    };

    if releases.is_empty() {
        println!("No releases found");
        return Ok(());
    }

    for release in &releases {
        println!("  {} ({})", release.metadata.key(), summary(&release.spec));
    }
    println!("\nTotal: {} releases", releases.len());
    Ok(())
}

/// Show one release
pub fn cmd_release_show(db_path: &Path, namespace: &str, name: &str) -> Result<()> {
    let store = open_store(db_path)?;
    let release: Release = store.require(&ObjectKey::namespaced(namespace, name))?;

    println!("Release: {}", release.metadata.key());
    println!("  {}", summary(&release.spec));
    if let Some(info) = &release.spec.info {
        if !info.description.is_empty() {
            println!("  Description: {}", info.description);
        }
        if !info.last_deployed.is_empty() {
            println!("  Last deployed: {}", info.last_deployed);
        }
    }
    for owner in &release.metadata.owner_references {
        println!("  Owner: {} {}", owner.kind, owner.name);
    }
    for (key, value) in &release.metadata.labels {
        println!("  Label: {}={}", key, value);
    }
    println!("  Hooks: {}", release.spec.hooks.len());
    Ok(())
}

/// Decode a release payload, or the payload of a secret document, and print it
pub fn cmd_release_decode(file: &str) -> Result<()> {
    let content =
        std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file))?;

    // a JSON object is a secret document; anything else is the payload itself
    let payload = match serde_json::from_str::<serde_json::Value>(&content) {
        Ok(document) if document.is_object() => {
            let secret: Secret = serde_json::from_value(document)
                .with_context(|| format!("Failed to parse secret document {}", file))?;
            secret
                .release_payload()
                .map(<[u8]>::to_vec)
                .with_context(|| format!("Secret in {} has no release payload", file))?
        }
        _ => content.into_bytes(),
    };

    let spec = decode_release(&payload)?;
    eprintln!("{} ({})", spec.name, summary(&spec));
    println!("{}", serde_json::to_string_pretty(&spec)?);
    Ok(())
}
