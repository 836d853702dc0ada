// src/model/source.rs

//! Source: a registered chart repository

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{HasStatus, ObjectMeta, Resource};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSpec {
    /// Repository base URL; the index lives at `<url>/index.yaml`
    pub url: String,
    /// Leave this Source alone entirely
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skip_sync: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<String>,
    /// Go-style duration to wait after a sync before running again. Empty
    /// means sync once per edit. This is a naive frequency with no guarantee
    /// about the time between updates.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub update_frequency: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    #[default]
    Unknown,
    Updating,
    Success,
    Error,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Unknown => write!(f, "unknown"),
            SyncState::Updating => write!(f, "updating"),
            SyncState::Success => write!(f, "success"),
            SyncState::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStatus {
    #[serde(default)]
    pub state: SyncState,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
    /// Applications this Source controls; recomputed on every status write
    #[serde(default)]
    pub app_count: usize,
}

impl SourceStatus {
    pub fn updating(reason: impl Into<String>) -> Self {
        Self {
            state: SyncState::Updating,
            reason: reason.into(),
            ..Default::default()
        }
    }

    pub fn success(last_update: DateTime<Utc>) -> Self {
        Self {
            state: SyncState::Success,
            last_update: Some(last_update),
            ..Default::default()
        }
    }

    /// An error status; the reason is never left empty
    pub fn error(reason: impl Into<String>, last_update: Option<DateTime<Utc>>) -> Self {
        let mut reason = reason.into();
        if reason.trim().is_empty() {
            reason = "unknown error".to_string();
        }
        Self {
            state: SyncState::Error,
            reason,
            last_update,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub metadata: ObjectMeta,
    pub spec: SourceSpec,
    #[serde(default)]
    pub status: SourceStatus,
}

impl Source {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::named(name),
            spec: SourceSpec {
                url: url.into(),
                ..Default::default()
            },
            status: SourceStatus::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

impl Resource for Source {
    const KIND: &'static str = "Source";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

impl HasStatus for Source {
    type Status = SourceStatus;

    fn status(&self) -> &SourceStatus {
        &self.status
    }

    fn status_mut(&mut self) -> &mut SourceStatus {
        &mut self.status
    }
}
