// src/store/memory.rs

//! In-process backend

use crate::error::{Error, Result};
use crate::model::ObjectKey;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;

use super::{Backend, resource_version_of};

type Slot = (String, ObjectKey);

/// Documents held in a map; nothing survives the process
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: RwLock<BTreeMap<Slot, Value>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(kind: &str, key: &ObjectKey) -> Slot {
        (kind.to_string(), key.clone())
    }
}

impl Backend for MemoryBackend {
    fn get(&self, kind: &str, key: &ObjectKey) -> Result<Option<Value>> {
        Ok(self.objects.read().get(&Self::slot(kind, key)).cloned())
    }

    fn list(&self, kind: &str, namespace: Option<&str>) -> Result<Vec<Value>> {
        let objects = self.objects.read();
        Ok(objects
            .iter()
            .filter(|((k, key), _)| k == kind && namespace.is_none_or(|ns| key.namespace == ns))
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    fn insert(&self, kind: &str, key: &ObjectKey, document: Value) -> Result<()> {
        let mut objects = self.objects.write();
        let slot = Self::slot(kind, key);
        if objects.contains_key(&slot) {
            return Err(Error::AlreadyExistsError(format!("{kind} {key}")));
        }
        objects.insert(slot, document);
        Ok(())
    }

    fn replace(&self, kind: &str, key: &ObjectKey, expected_version: u64, document: Value) -> Result<()> {
        let mut objects = self.objects.write();
        let Some(current) = objects.get_mut(&Self::slot(kind, key)) else {
            return Err(Error::NotFoundError(format!("{kind} {key}")));
        };

        let stored_version = resource_version_of(current);
        if stored_version != expected_version {
            return Err(Error::ConflictError(format!(
                "{kind} {key} is at resource version {stored_version}, expected {expected_version}"
            )));
        }

        *current = document;
        Ok(())
    }

    fn remove(&self, kind: &str, key: &ObjectKey) -> Result<Option<Value>> {
        Ok(self.objects.write().remove(&Self::slot(kind, key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_replace_checks_version() {
        let backend = MemoryBackend::new();
        let key = ObjectKey::cluster("stable");
        backend
            .insert("Source", &key, json!({"metadata": {"name": "stable", "resourceVersion": 1}}))
            .unwrap();

        let next = json!({"metadata": {"name": "stable", "resourceVersion": 2}});
        assert!(matches!(
            backend.replace("Source", &key, 7, next.clone()),
            Err(Error::ConflictError(_))
        ));
        backend.replace("Source", &key, 1, next).unwrap();
        assert_eq!(
            resource_version_of(&backend.get("Source", &key).unwrap().unwrap()),
            2
        );
    }

    #[test]
    fn test_kinds_are_separate() {
        let backend = MemoryBackend::new();
        let key = ObjectKey::cluster("stable");
        backend.insert("Source", &key, json!({})).unwrap();
        backend.insert("Application", &key, json!({})).unwrap();
        assert!(backend.insert("Source", &key, json!({})).is_err());
        assert_eq!(backend.list("Source", None).unwrap().len(), 1);
        assert!(backend.remove("Application", &key).unwrap().is_some());
        assert!(backend.get("Application", &key).unwrap().is_none());
    }
}
