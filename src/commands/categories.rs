// src/commands/categories.rs
//! Category overlay commands

use super::open_store;
use anyhow::{Context, Result};
use marketplace::catalog::{CategoryCache, parse_categories};
use marketplace::model::{ConfigMap, ObjectKey, ObjectMeta};
use marketplace::OpResult;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// ConfigMap data key written by `categories import`
const CATEGORIES_DATA_KEY: &str = "categories.yaml";

/// Store the category document in `file` as the overlay ConfigMap
pub fn cmd_categories_import(db_path: &Path, key: &ObjectKey, file: &str) -> Result<()> {
    let document = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read category document {}", file))?;
    let categories = parse_categories(&document)
        .with_context(|| format!("Invalid category document {}", file))?;

    let store = open_store(db_path)?;
    let seed = ConfigMap {
        metadata: ObjectMeta::namespaced(key.namespace.clone(), key.name.clone()),
        data: BTreeMap::new(),
    };
    let (_, op) = store.create_or_update(&seed, |cm| {
        cm.data = BTreeMap::from([(CATEGORIES_DATA_KEY.to_string(), document.clone())]);
        Ok(())
    })?;

    info!("Category ConfigMap {} {:?}", key, op);
    match op {
        OpResult::Unchanged => println!("Categories in {} are already up to date", key),
        _ => println!("Imported categories for {} packages into {}", categories.len(), key),
    }
    Ok(())
}

/// Print the overlay the controllers would use right now
pub fn cmd_categories_show(db_path: &Path, key: &ObjectKey) -> Result<()> {
    let store = open_store(db_path)?;
    let cache = CategoryCache::new();
    cache.refresh(&store, key);

    let categories = cache.snapshot();
    if categories.is_empty() {
        println!("No categories configured in {}", key);
        return Ok(());
    }

    println!("Categories from {}:", key);
    for (package, list) in &categories {
        println!("  {}: {}", package, list.join(", "));
    }
    Ok(())
}
