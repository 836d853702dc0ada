// src/catalog/categories.rs

//! Category overlay
//!
//! Operators publish a ConfigMap whose first data entry maps category names
//! to package names:
//!
//! ```yaml
//! database: [mysql, postgresql]
//! Cache: [redis, mysql]
//! ```
//!
//! The controller needs the inverse (package to categories), which is what
//! [`parse_categories`] produces and [`CategoryCache`] holds between cycles.

use crate::error::{Error, Result};
use crate::model::{ConfigMap, ObjectKey};
use crate::store::Store;
use parking_lot::RwLock;
use serde_yaml::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Namespace of the default overlay ConfigMap
pub const DEFAULT_CATEGORIES_NAMESPACE: &str = "critical-stack";

/// Name of the default overlay ConfigMap
pub const DEFAULT_CATEGORIES_NAME: &str = "marketplace-app-categories";

/// Package name to lower-cased category names, in document order
pub type CategoryMap = BTreeMap<String, Vec<String>>;

/// Invert a category document (YAML or JSON)
///
/// Category names are lower-cased; package names keep their case. A package
/// listed under several categories keeps each of them once.
pub fn parse_categories(document: &str) -> Result<CategoryMap> {
    let mut result = CategoryMap::new();
    if document.trim().is_empty() {
        return Ok(result);
    }

    let value: Value = serde_yaml::from_str(document)
        .map_err(|e| Error::ConfigError(format!("invalid category document: {e}")))?;

    let by_category = match value {
        Value::Null => return Ok(result),
        Value::Mapping(m) => m,
        other => {
            return Err(Error::ConfigError(format!(
                "category document must be a mapping, found {}",
                type_name(&other)
            )));
        }
    };

    for (category, packages) in by_category {
        let category = match category {
            Value::String(s) => s.to_lowercase(),
            other => {
                return Err(Error::ConfigError(format!(
                    "category names must be strings, found {}",
                    type_name(&other)
                )));
            }
        };

        let packages = match packages {
            Value::Null => continue,
            Value::Sequence(seq) => seq,
            other => {
                return Err(Error::ConfigError(format!(
                    "category {category} must list package names, found {}",
                    type_name(&other)
                )));
            }
        };

        for package in packages {
            let Value::String(package) = package else {
                return Err(Error::ConfigError(format!(
                    "category {category} contains a non-string package name"
                )));
            };
            let categories = result.entry(package).or_default();
            if !categories.contains(&category) {
                categories.push(category.clone());
            }
        }
    }

    Ok(result)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// Shared, refreshable category overlay
///
/// Every Source cycle refreshes the cache before merging; concurrent cycles
/// may race on the refresh and the last one wins.
#[derive(Debug, Default)]
pub struct CategoryCache {
    categories: RwLock<CategoryMap>,
}

impl CategoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_categories(categories: CategoryMap) -> Self {
        Self {
            categories: RwLock::new(categories),
        }
    }

    /// Categories of `package`, empty when it has none
    pub fn categories_for(&self, package: &str) -> Vec<String> {
        self.categories.read().get(package).cloned().unwrap_or_default()
    }

    pub fn snapshot(&self) -> CategoryMap {
        self.categories.read().clone()
    }

    pub fn replace(&self, categories: CategoryMap) {
        *self.categories.write() = categories;
    }

    /// Reload from the ConfigMap at `key`
    ///
    /// A missing ConfigMap clears the overlay. A ConfigMap that cannot be read
    /// or parsed is logged and the current overlay is kept.
    pub fn refresh(&self, store: &Store, key: &ObjectKey) {
        let config_map = match store.get::<ConfigMap>(key) {
            Ok(Some(cm)) => cm,
            Ok(None) => {
                debug!("Category ConfigMap {} not found, using no categories", key);
                self.replace(CategoryMap::new());
                return;
            }
            Err(e) => {
                warn!("Failed to retrieve category ConfigMap {}: {}", key, e);
                return;
            }
        };

        let Some((entry, document)) = config_map.data.iter().next() else {
            self.replace(CategoryMap::new());
            return;
        };

        match parse_categories(document) {
            Ok(categories) => {
                debug!(
                    "Loaded categories for {} packages from {} ({})",
                    categories.len(),
                    key,
                    entry
                );
                self.replace(categories);
            }
            Err(e) => {
                warn!("Failed to parse categories in ConfigMap {}: {}", key, e);
            }
        }
    }
}
