// src/catalog/merge.rs

//! Merge of index entries into an Application record
//!
//! Synchronization is additive: versions are appended the first time they are
//! seen and never rewritten or removed, so merging the same index twice is a
//! no-op.

use crate::model::{Application, ChartVersion, labels};
use crate::repository::normalize_url;

/// What a merge did to an Application
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Version strings appended, in index order
    pub appended: Vec<String>,
    /// Whether any label was added, changed or removed
    pub labels_changed: bool,
}

impl MergeOutcome {
    /// At least one version was appended
    pub fn changed(&self) -> bool {
        !self.appended.is_empty()
    }

    /// The record differs from what was read and must be written back
    pub fn needs_write(&self) -> bool {
        self.changed() || self.labels_changed
    }
}

/// Merge `entries` (index order) and the package's overlay `categories` into `app`
pub fn merge_application(
    app: &mut Application,
    categories: &[String],
    entries: &[ChartVersion],
    source_url: &str,
) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();

    for category in categories {
        let previous = app
            .metadata
            .labels
            .insert(labels::category_label(category), String::new());
        if previous.as_deref() != Some("") {
            outcome.labels_changed = true;
        }
    }

    for entry in entries {
        if app.has_version(entry.version()) {
            continue;
        }

        let mut recorded = entry.clone();
        recorded.urls = entry
            .urls
            .iter()
            .map(|u| normalize_url(source_url, u))
            .collect();

        outcome.appended.push(recorded.version().to_string());
        app.versions.push(recorded);
    }

    if outcome.changed() && update_deprecated_label(app) {
        outcome.labels_changed = true;
    }

    outcome
}

/// Set the deprecated label iff any recorded version is deprecated
///
/// Returns whether the label changed.
fn update_deprecated_label(app: &mut Application) -> bool {
    let deprecated = app.versions.iter().any(ChartVersion::is_deprecated);
    let current = &mut app.metadata.labels;

    if deprecated {
        current.insert(labels::DEPRECATED.to_string(), "true".to_string()).as_deref() != Some("true")
    } else {
        current.remove(labels::DEPRECATED).is_some()
    }
}
