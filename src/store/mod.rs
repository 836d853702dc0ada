// src/store/mod.rs

//! Resource store
//!
//! Records are JSON documents keyed by `(kind, namespace, name)`. A
//! [`Backend`] only stores documents and enforces compare-and-swap on the
//! resource version; [`Store`] layers the record semantics on top:
//!
//! - create assigns uid, generation 1 and resource version 1
//! - update is optimistic: the caller's resource version must match
//! - generation only moves when something outside metadata and status changes
//! - status is written exclusively through [`Store::patch_status`]
//! - delete cascades to records owned by the deleted one

mod memory;
mod sqlite;

pub use memory::MemoryBackend;
pub use sqlite::{SCHEMA_VERSION, SqliteBackend};

use crate::error::{Error, Result};
use crate::model::{Application, HasStatus, ObjectKey, ObjectMeta, Release, Resource};
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Attempts made by read-modify-write helpers before giving up on conflicts
pub const MAX_WRITE_ATTEMPTS: u32 = 5;

/// Kinds that can carry owner references and are garbage collected
const DEPENDENT_KINDS: &[&str] = &[Application::KIND, Release::KIND];

/// Raw document storage
pub trait Backend: Send + Sync {
    fn get(&self, kind: &str, key: &ObjectKey) -> Result<Option<Value>>;

    /// Documents of `kind`, optionally restricted to one namespace, ordered by key
    fn list(&self, kind: &str, namespace: Option<&str>) -> Result<Vec<Value>>;

    /// Store a new document; `AlreadyExistsError` when the key is taken
    fn insert(&self, kind: &str, key: &ObjectKey, document: Value) -> Result<()>;

    /// Overwrite a document whose stored resource version is `expected_version`
    ///
    /// `ConflictError` when the stored version differs, `NotFoundError` when
    /// there is nothing to overwrite.
    fn replace(&self, kind: &str, key: &ObjectKey, expected_version: u64, document: Value) -> Result<()>;

    fn remove(&self, kind: &str, key: &ObjectKey) -> Result<Option<Value>>;
}

/// Equality-based label selector; an empty selector matches everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    /// Label key to required value; `None` only requires the key to be present
    required: BTreeMap<String, Option<String>>,
}

impl LabelSelector {
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn eq(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.required.insert(key.into(), Some(value.into()));
        self
    }

    pub fn exists(mut self, key: impl Into<String>) -> Self {
        self.required.insert(key.into(), None);
        self
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.required.iter().all(|(k, want)| match (labels.get(k), want) {
            (Some(actual), Some(want)) => actual == want,
            (Some(_), None) => true,
            (None, _) => false,
        })
    }
}

/// What [`Store::create_or_update`] ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpResult {
    Created,
    Updated,
    Unchanged,
}

/// Typed access to records held by a [`Backend`]
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn Backend>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}

fn not_found<T: Resource>(key: &ObjectKey) -> Error {
    Error::NotFoundError(format!("{} {}", T::KIND, key))
}

fn metadata_of(document: &Value) -> Result<ObjectMeta> {
    let meta = document.get("metadata").cloned().unwrap_or(Value::Null);
    Ok(serde_json::from_value(meta)?)
}

pub(crate) fn resource_version_of(document: &Value) -> u64 {
    document
        .pointer("/metadata/resourceVersion")
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

/// The document without `metadata` and `status`
fn spec_of(document: &Value) -> Value {
    let mut spec = document.clone();
    if let Some(fields) = spec.as_object_mut() {
        fields.remove("metadata");
        fields.remove("status");
    }
    spec
}

impl Store {
    pub fn new<B: Backend + 'static>(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// A store that lives only as long as the process
    pub fn memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Open (creating and migrating if needed) a SQLite-backed store
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(SqliteBackend::open(path)?))
    }

    pub fn get<T: Resource>(&self, key: &ObjectKey) -> Result<Option<T>> {
        match self.backend.get(T::KIND, key)? {
            Some(document) => Ok(Some(serde_json::from_value(document)?)),
            None => Ok(None),
        }
    }

    /// Like [`get`](Self::get) but a missing record is a `NotFoundError`
    pub fn require<T: Resource>(&self, key: &ObjectKey) -> Result<T> {
        self.get(key)?.ok_or_else(|| not_found::<T>(key))
    }

    /// Records of every namespace whose labels match `selector`
    pub fn list<T: Resource>(&self, selector: &LabelSelector) -> Result<Vec<T>> {
        self.list_in(None, selector)
    }

    pub fn list_namespaced<T: Resource>(&self, namespace: &str, selector: &LabelSelector) -> Result<Vec<T>> {
        self.list_in(Some(namespace), selector)
    }

    fn list_in<T: Resource>(&self, namespace: Option<&str>, selector: &LabelSelector) -> Result<Vec<T>> {
        let mut out = Vec::new();
        for document in self.backend.list(T::KIND, namespace)? {
            let object: T = serde_json::from_value(document)?;
            if selector.matches(&object.metadata().labels) {
                out.push(object);
            }
        }
        Ok(out)
    }

    /// Store a new record, returning it with its assigned metadata
    pub fn create<T: Resource>(&self, object: &T) -> Result<T> {
        let key = object.key();
        if key.name.is_empty() {
            return Err(Error::StoreError(format!("{} name must not be empty", T::KIND)));
        }

        let mut created = object.clone();
        let meta = created.metadata_mut();
        meta.uid = uuid::Uuid::new_v4().to_string();
        meta.generation = 1;
        meta.resource_version = 1;
        meta.creation_timestamp = Some(Utc::now());

        self.backend
            .insert(T::KIND, &key, serde_json::to_value(&created)?)
            .map_err(|e| match e {
                Error::AlreadyExistsError(_) => Error::AlreadyExistsError(format!("{} {}", T::KIND, key)),
                other => other,
            })?;

        debug!("Created {} {}", T::KIND, key);
        Ok(created)
    }

    /// Replace a record's spec and metadata; status is left as stored
    pub fn update<T: Resource>(&self, object: &T) -> Result<T> {
        self.write(object, true)
    }

    fn write<T: Resource>(&self, object: &T, keep_stored_status: bool) -> Result<T> {
        let key = object.key();
        let stored = self.backend.get(T::KIND, &key)?.ok_or_else(|| not_found::<T>(&key))?;
        let stored_meta = metadata_of(&stored)?;

        let expected = object.metadata().resource_version;
        if expected != stored_meta.resource_version {
            return Err(Error::ConflictError(format!(
                "{} {} was modified (resource version {} is stale, current is {})",
                T::KIND,
                key,
                expected,
                stored_meta.resource_version
            )));
        }

        let spec_changed = spec_of(&serde_json::to_value(object)?) != spec_of(&stored);

        let mut next = object.clone();
        let meta = next.metadata_mut();
        meta.uid = stored_meta.uid.clone();
        meta.creation_timestamp = stored_meta.creation_timestamp;
        meta.generation = stored_meta.generation + u64::from(spec_changed);
        meta.resource_version = stored_meta.resource_version + 1;

        let mut document = serde_json::to_value(&next)?;
        if keep_stored_status
            && let (Some(fields), Some(status)) = (document.as_object_mut(), stored.get("status"))
        {
            fields.insert("status".to_string(), status.clone());
        }

        self.backend
            .replace(T::KIND, &key, stored_meta.resource_version, document.clone())?;
        Ok(serde_json::from_value(document)?)
    }

    /// Read-modify-write `seed`'s record, creating it from `seed` when missing
    ///
    /// `mutate` runs against the freshest stored copy on every attempt and
    /// must leave the record's identity alone. Conflicts are retried up to
    /// [`MAX_WRITE_ATTEMPTS`] times. No write happens when `mutate` leaves
    /// the record unchanged.
    pub fn create_or_update<T, F>(&self, seed: &T, mut mutate: F) -> Result<(T, OpResult)>
    where
        T: Resource,
        F: FnMut(&mut T) -> Result<()>,
    {
        let key = seed.key();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let result = match self.get::<T>(&key)? {
                None => {
                    let mut object = seed.clone();
                    mutate(&mut object)?;
                    ensure_same_key::<T>(&key, &object)?;
                    self.create(&object).map(|o| (o, OpResult::Created))
                }
                Some(current) => {
                    let mut object = current.clone();
                    mutate(&mut object)?;
                    ensure_same_key::<T>(&key, &object)?;
                    if serde_json::to_value(&object)? == serde_json::to_value(&current)? {
                        return Ok((current, OpResult::Unchanged));
                    }
                    self.update(&object).map(|o| (o, OpResult::Updated))
                }
            };

            match result {
                Err(e) if e.is_conflict() && attempt < MAX_WRITE_ATTEMPTS => {
                    debug!("{} {} write attempt {} conflicted: {}, retrying", T::KIND, key, attempt, e);
                }
                other => return other,
            }
        }
    }

    /// Replace only the status of a record
    ///
    /// Re-reads and retries on conflict; never bumps the generation.
    pub fn patch_status<T: HasStatus>(&self, key: &ObjectKey, status: &T::Status) -> Result<T> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let mut object: T = self.require(key)?;
            *object.status_mut() = status.clone();

            match self.write(&object, false) {
                Err(e) if e.is_conflict() && attempt < MAX_WRITE_ATTEMPTS => {
                    debug!("{} {} status write attempt {} conflicted, retrying", T::KIND, key, attempt);
                }
                other => return other,
            }
        }
    }

    /// Delete a record and, recursively, every record it owns
    ///
    /// A dependent with other owners left only loses its reference to the
    /// deleted record. Returns whether the record existed.
    pub fn delete<T: Resource>(&self, key: &ObjectKey) -> Result<bool> {
        let Some(document) = self.backend.remove(T::KIND, key)? else {
            return Ok(false);
        };
        debug!("Deleted {} {}", T::KIND, key);

        let uid = metadata_of(&document)?.uid;
        if !uid.is_empty() {
            self.collect_garbage(&uid)?;
        }
        Ok(true)
    }

    fn collect_garbage(&self, owner_uid: &str) -> Result<()> {
        for kind in DEPENDENT_KINDS {
            for mut document in self.backend.list(kind, None)? {
                let mut meta = metadata_of(&document)?;
                if !meta.is_owned_by(owner_uid) {
                    continue;
                }
                meta.owner_references.retain(|r| r.uid != owner_uid);

                if meta.owner_references.is_empty() {
                    if self.backend.remove(kind, &meta.key())?.is_some() {
                        debug!("Garbage collected {} {}", kind, meta.key());
                        if !meta.uid.is_empty() {
                            self.collect_garbage(&meta.uid)?;
                        }
                    }
                    continue;
                }

                let version = meta.resource_version;
                meta.resource_version += 1;
                document["metadata"] = serde_json::to_value(&meta)?;
                self.backend.replace(kind, &meta.key(), version, document)?;
                debug!("Dropped deleted owner from {} {}", kind, meta.key());
            }
        }
        Ok(())
    }
}

fn ensure_same_key<T: Resource>(key: &ObjectKey, object: &T) -> Result<()> {
    if object.key() != *key {
        return Err(Error::StoreError(format!(
            "mutation changed the identity of {} {} to {}",
            T::KIND,
            key,
            object.key()
        )));
    }
    Ok(())
}
