// src/model/meta.rs

//! Object metadata shared by every record kind

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::Resource;

/// Identity of a record within its kind: `namespace/name`, or just `name`
/// for cluster-scoped kinds
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    #[serde(default)]
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            namespace: String::new(),
            name: name.into(),
        }
    }

    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

/// Link from a child record to the record responsible for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerReference {
    pub kind: String,
    pub name: String,
    pub uid: String,
    /// At most one owner reference per record is the controller
    #[serde(default)]
    pub controller: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    /// Bumped by the store whenever anything outside metadata and status changes
    #[serde(default)]
    pub generation: u64,
    /// Bumped on every write; used for optimistic concurrency
    #[serde(default, deserialize_with = "resource_version")]
    pub resource_version: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::namespaced(self.namespace.clone(), self.name.clone())
    }

    /// The controlling owner reference, if any
    pub fn controller(&self) -> Option<&OwnerReference> {
        self.owner_references.iter().find(|r| r.controller)
    }

    pub fn is_owned_by(&self, uid: &str) -> bool {
        self.owner_references.iter().any(|r| r.uid == uid)
    }
}

/// Accepts the opaque string Kubernetes writes as well as a number; a
/// non-numeric string reads as 0
fn resource_version<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Version {
        Number(u64),
        Text(String),
    }

    Ok(match Version::deserialize(deserializer)? {
        Version::Number(n) => n,
        Version::Text(s) => s.parse().unwrap_or(0),
    })
}

fn reference_to<T: Resource>(owner: &T, controller: bool) -> Result<OwnerReference> {
    let meta = owner.metadata();
    if meta.uid.is_empty() {
        return Err(Error::StoreError(format!(
            "{} {} has no uid; it must be stored before it can own records",
            T::KIND,
            meta.name
        )));
    }
    Ok(OwnerReference {
        kind: T::KIND.to_string(),
        name: meta.name.clone(),
        uid: meta.uid.clone(),
        controller,
    })
}

/// Make `owner` the controller of `object`
///
/// Fails when another record already controls `object`.
pub fn set_controller_reference<T: Resource>(owner: &T, object: &mut ObjectMeta) -> Result<()> {
    let reference = reference_to(owner, true)?;

    if let Some(existing) = object.controller()
        && existing.uid != reference.uid
    {
        return Err(Error::StoreError(format!(
            "{} is already controlled by {} {}",
            object.name, existing.kind, existing.name
        )));
    }

    object.owner_references.retain(|r| r.uid != reference.uid);
    object.owner_references.push(reference);
    Ok(())
}

/// Add `owner` as a non-controlling owner of `object` (idempotent)
pub fn set_owner_reference<T: Resource>(owner: &T, object: &mut ObjectMeta) -> Result<()> {
    let reference = reference_to(owner, false)?;
    if !object.is_owned_by(&reference.uid) {
        object.owner_references.push(reference);
    }
    Ok(())
}
