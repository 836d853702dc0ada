// src/error.rs

//! Error types for the marketplace controllers
//!
//! The reconcilers capture fetch, parse and configuration failures into a
//! Source's status instead of returning them; only store failures travel
//! back to the host scheduler.

use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Transport failure talking to a remote repository
    #[error("{0}")]
    FetchError(String),

    /// A repository index or imported document is malformed
    #[error("{0}")]
    ParseError(String),

    /// Invalid configuration value (poll interval, config file)
    #[error("{0}")]
    ConfigError(String),

    /// Release payload could not be decoded
    #[error("failed to decode release: {0}")]
    DecodeError(String),

    /// Resource store rejected a write or is unavailable
    #[error("store error: {0}")]
    StoreError(String),

    /// Optimistic concurrency check failed
    #[error("conflict: {0}")]
    ConflictError(String),

    #[error("{0} not found")]
    NotFoundError(String),

    #[error("{0} already exists")]
    AlreadyExistsError(String),

    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    IoError(String),
}

impl Error {
    /// Whether retrying the same read-modify-write may succeed
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::ConflictError(_) | Error::AlreadyExistsError(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::StoreError(format!("record serialization failed: {e}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(e.to_string())
    }
}
