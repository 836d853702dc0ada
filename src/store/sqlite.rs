// src/store/sqlite.rs

//! SQLite backend
//!
//! Every record lives in one `objects` table as a JSON document. The
//! resource version is mirrored into its own column so overwrites can be
//! done as a single compare-and-swap `UPDATE`.

use crate::error::{Error, Result};
use crate::model::ObjectKey;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

use super::{Backend, resource_version_of};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Documents persisted in a SQLite database file
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend").finish_non_exhaustive()
    }
}

impl SqliteBackend {
    /// Open the database at `path`, creating parent directories and applying
    /// pending migrations
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::IoError(format!("Failed to create directory {}: {e}", parent.display()))
            })?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        migrate(&conn)?;

        debug!("Opened resource store at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn parse_document(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).map_err(|e| Error::StoreError(format!("corrupt stored document: {e}")))
}

impl Backend for SqliteBackend {
    fn get(&self, kind: &str, key: &ObjectKey) -> Result<Option<Value>> {
        let conn = self.conn.lock();
        let raw: Option<String> = conn
            .query_row(
                "SELECT document FROM objects WHERE kind = ?1 AND namespace = ?2 AND name = ?3",
                params![kind, key.namespace, key.name],
                |row| row.get(0),
            )
            .optional()?;
        raw.as_deref().map(parse_document).transpose()
    }

    fn list(&self, kind: &str, namespace: Option<&str>) -> Result<Vec<Value>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT document FROM objects
             WHERE kind = ?1 AND (?2 IS NULL OR namespace = ?2)
             ORDER BY namespace, name",
        )?;
        let rows = stmt.query_map(params![kind, namespace], |row| row.get::<_, String>(0))?;

        let mut documents = Vec::new();
        for raw in rows {
            documents.push(parse_document(&raw?)?);
        }
        Ok(documents)
    }

    fn insert(&self, kind: &str, key: &ObjectKey, document: Value) -> Result<()> {
        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO objects (kind, namespace, name, resource_version, document)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                kind,
                key.namespace,
                key.name,
                resource_version_of(&document) as i64,
                document.to_string()
            ],
        )?;
        if inserted == 0 {
            return Err(Error::AlreadyExistsError(format!("{kind} {key}")));
        }
        Ok(())
    }

    fn replace(&self, kind: &str, key: &ObjectKey, expected_version: u64, document: Value) -> Result<()> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE objects SET resource_version = ?1, document = ?2, updated_at = CURRENT_TIMESTAMP
             WHERE kind = ?3 AND namespace = ?4 AND name = ?5 AND resource_version = ?6",
            params![
                resource_version_of(&document) as i64,
                document.to_string(),
                kind,
                key.namespace,
                key.name,
                expected_version as i64
            ],
        )?;
        if updated == 1 {
            return Ok(());
        }

        let stored: Option<i64> = conn
            .query_row(
                "SELECT resource_version FROM objects WHERE kind = ?1 AND namespace = ?2 AND name = ?3",
                params![kind, key.namespace, key.name],
                |row| row.get(0),
            )
            .optional()?;
        match stored {
            Some(version) => Err(Error::ConflictError(format!(
                "{kind} {key} is at resource version {version}, expected {expected_version}"
            ))),
            None => Err(Error::NotFoundError(format!("{kind} {key}"))),
        }
    }

    fn remove(&self, kind: &str, key: &ObjectKey) -> Result<Option<Value>> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let raw: Option<String> = tx
            .query_row(
                "SELECT document FROM objects WHERE kind = ?1 AND namespace = ?2 AND name = ?3",
                params![kind, key.namespace, key.name],
                |row| row.get(0),
            )
            .optional()?;
        if raw.is_some() {
            tx.execute(
                "DELETE FROM objects WHERE kind = ?1 AND namespace = ?2 AND name = ?3",
                params![kind, key.namespace, key.name],
            )?;
        }
        tx.commit()?;
        raw.as_deref().map(parse_document).transpose()
    }
}

/// Initialize the schema version tracking table
fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0);

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Apply all pending migrations to bring the database up to date
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    debug!("Current schema version: {}", current_version);

    if current_version >= SCHEMA_VERSION {
        return Ok(());
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying migration to version {}", version);
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        other => Err(Error::StoreError(format!("unknown schema version {other}"))),
    }
}

/// Initial schema - Version 1
///
/// - objects: every stored record, keyed by kind and namespaced name
fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        CREATE TABLE objects (
            kind TEXT NOT NULL,
            namespace TEXT NOT NULL DEFAULT '',
            name TEXT NOT NULL,
            resource_version INTEGER NOT NULL,
            document TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (kind, namespace, name)
        );

        CREATE INDEX idx_objects_kind ON objects(kind);
        ",
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_documents_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("marketplace.db");
        let key = ObjectKey::namespaced("default", "wordpress");

        {
            let backend = SqliteBackend::open(&path).unwrap();
            backend
                .insert("Release", &key, json!({"metadata": {"name": "wordpress", "resourceVersion": 1}}))
                .unwrap();
        }

        let backend = SqliteBackend::open(&path).unwrap();
        let doc = backend.get("Release", &key).unwrap().unwrap();
        assert_eq!(doc["metadata"]["name"], "wordpress");
    }

    #[test]
    fn test_replace_conflict_and_not_found() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let key = ObjectKey::cluster("stable");
        let doc = |rv: u64| json!({"metadata": {"name": "stable", "resourceVersion": rv}});

        assert!(matches!(
            backend.replace("Source", &key, 1, doc(2)),
            Err(Error::NotFoundError(_))
        ));

        backend.insert("Source", &key, doc(1)).unwrap();
        assert!(matches!(
            backend.insert("Source", &key, doc(1)),
            Err(Error::AlreadyExistsError(_))
        ));
        backend.replace("Source", &key, 1, doc(2)).unwrap();
        assert!(matches!(
            backend.replace("Source", &key, 1, doc(3)),
            Err(Error::ConflictError(_))
        ));
    }

    #[test]
    fn test_list_filters_namespace() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        backend
            .insert("Secret", &ObjectKey::namespaced("a", "x"), json!({"n": 1}))
            .unwrap();
        backend
            .insert("Secret", &ObjectKey::namespaced("b", "x"), json!({"n": 2}))
            .unwrap();

        assert_eq!(backend.list("Secret", None).unwrap().len(), 2);
        let only_b = backend.list("Secret", Some("b")).unwrap();
        assert_eq!(only_b, vec![json!({"n": 2})]);
    }
}
