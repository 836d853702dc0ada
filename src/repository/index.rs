// src/repository/index.rs

//! Chart repository index loading
//!
//! An index is a YAML (or JSON) document listing every published version of
//! every package. Loading follows Helm's rules: `apiVersion` is required,
//! null version entries are dropped, and each package's versions are sorted
//! newest first. That sorted order is the order versions are recorded in.

use crate::error::{Error, Result};
use crate::model::ChartVersion;
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::client::FetchClient;
use super::urls::repository_file_url;

/// File name of the index at the repository root
pub const INDEX_FILE: &str = "index.yaml";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIndex {
    #[serde(default)]
    api_version: Option<String>,
    #[serde(default)]
    generated: Option<String>,
    #[serde(default)]
    entries: Option<BTreeMap<String, Option<Vec<Option<ChartVersion>>>>>,
}

/// A parsed repository index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexFile {
    pub api_version: String,
    pub generated: Option<String>,
    /// Package name to versions, newest first
    pub entries: BTreeMap<String, Vec<ChartVersion>>,
}

impl IndexFile {
    /// Parse an index document
    pub fn load(data: &[u8]) -> Result<Self> {
        let raw: RawIndex = serde_yaml::from_slice(data)
            .map_err(|e| Error::ParseError(format!("failed to parse repository index: {e}")))?;

        let api_version = raw
            .api_version
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| Error::ParseError("no API version specified in repository index".to_string()))?;

        let mut entries = BTreeMap::new();
        for (package, versions) in raw.entries.unwrap_or_default() {
            let mut versions: Vec<ChartVersion> = versions.unwrap_or_default().into_iter().flatten().collect();
            versions.sort_by(newest_first);
            entries.insert(package, versions);
        }

        Ok(Self {
            api_version,
            generated: raw.generated,
            entries,
        })
    }

    pub fn package_count(&self) -> usize {
        self.entries.len()
    }

    pub fn version_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

/// Download and parse `<repo_url>/index.yaml`
pub fn fetch_index(client: &dyn FetchClient, repo_url: &str) -> Result<IndexFile> {
    let index_url = repository_file_url(repo_url, INDEX_FILE)
        .ok_or_else(|| Error::FetchError(format!("invalid repository URL {repo_url:?}")))?;

    info!("Fetching repository index from {}", index_url);
    let body = client.get(&index_url)?;
    debug!("Downloaded {} bytes from {}", body.len(), index_url);

    let index = IndexFile::load(&body)?;
    info!(
        "Loaded index with {} packages ({} versions)",
        index.package_count(),
        index.version_count()
    );
    Ok(index)
}

/// Parse a version the way chart tooling does: an optional leading `v` and
/// missing minor/patch components are accepted
pub fn parse_version(raw: &str) -> Option<semver::Version> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    if let Ok(v) = semver::Version::parse(trimmed) {
        return Some(v);
    }

    let split = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(split);
    let padded = match core.split('.').count() {
        1 => format!("{core}.0.0{suffix}"),
        2 => format!("{core}.0{suffix}"),
        _ => return None,
    };
    semver::Version::parse(&padded).ok()
}

/// Semantic versions newest first, then unparsable versions in descending
/// string order
fn newest_first(a: &ChartVersion, b: &ChartVersion) -> Ordering {
    match (parse_version(a.version()), parse_version(b.version())) {
        (Some(va), Some(vb)) => vb.cmp(&va).then_with(|| b.version().cmp(a.version())),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.version().cmp(a.version()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r#"
apiVersion: v1
generated: "2020-06-13T09:23:31.000000000-04:00"
entries:
  mysql:
    - name: mysql
      version: 1.6.1
      urls: [mysql-1.6.1.tgz]
    - null
    - name: mysql
      version: 1.6.10
      urls: [mysql-1.6.10.tgz]
    - name: mysql
      version: 1.6.2
      urls: [mysql-1.6.2.tgz]
  empty:
  redis:
    - name: redis
      version: v2.0
"#;

    #[test]
    fn test_load_sorts_newest_first_and_drops_nulls() {
        let index = IndexFile::load(INDEX.as_bytes()).unwrap();
        assert_eq!(index.api_version, "v1");

        let versions: Vec<&str> = index.entries["mysql"].iter().map(|v| v.version()).collect();
        assert_eq!(versions, vec!["1.6.10", "1.6.2", "1.6.1"]);
        assert_eq!(index.entries["redis"][0].version(), "v2.0");
        assert!(index.entries["empty"].is_empty());
        assert_eq!(index.package_count(), 3);
        assert_eq!(index.version_count(), 4);
    }

    #[test]
    fn test_missing_api_version_is_parse_error() {
        let err = IndexFile::load(b"entries: {}\n").unwrap_err();
        assert!(matches!(err, Error::ParseError(_)));
        assert!(err.to_string().contains("no API version"));
    }

    #[test]
    fn test_malformed_document_is_parse_error() {
        let err = IndexFile::load(b"apiVersion: v1\nentries: [unclosed").unwrap_err();
        assert!(matches!(err, Error::ParseError(_)));
    }

    #[test]
    fn test_json_index_is_accepted() {
        let json = br#"{"apiVersion": "v1", "entries": {"nginx": [{"name": "nginx", "version": "0.1.0"}]}}"#;
        let index = IndexFile::load(json).unwrap();
        assert_eq!(index.entries["nginx"][0].version(), "0.1.0");
    }

    #[test]
    fn test_parse_version_is_lenient() {
        assert_eq!(parse_version("v1.2.3"), Some(semver::Version::new(1, 2, 3)));
        assert_eq!(parse_version("1.2"), Some(semver::Version::new(1, 2, 0)));
        assert_eq!(parse_version("2"), Some(semver::Version::new(2, 0, 0)));
        assert!(parse_version("1.0-beta").unwrap().pre.as_str() == "beta");
        assert_eq!(parse_version("latest"), None);
    }

    #[test]
    fn test_non_semver_sorts_after_semver() {
        let data = r#"
apiVersion: v1
entries:
  odd:
    - version: nightly
    - version: 0.1.0
    - version: canary
    - version: 0.2.0
"#;
        let index = IndexFile::load(data.as_bytes()).unwrap();
        let versions: Vec<&str> = index.entries["odd"].iter().map(|v| v.version()).collect();
        assert_eq!(versions, vec!["0.2.0", "0.1.0", "nightly", "canary"]);
    }
}
