// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::write::GzEncoder;
use marketplace::catalog::CategoryCache;
use marketplace::model::{HELM_RELEASE_SECRET_TYPE, ObjectKey, ObjectMeta, RELEASE_DATA_KEY, Secret};
use marketplace::repository::HttpResolver;
use marketplace::{MemoryRecorder, SourceReconciler, Store};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::runtime::Runtime;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Create an on-disk SQLite store.
///
/// Returns (TempDir, Store) - keep the TempDir alive to prevent cleanup.
pub fn sqlite_store() -> (TempDir, Store) {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = Store::open(temp_dir.path().join("marketplace.db")).unwrap();
    (temp_dir, store)
}

/// A chart repository served over HTTP.
///
/// The server runs on its own runtime threads so the blocking HTTP client
/// can be used from the test thread.
pub struct ChartRepo {
    runtime: Runtime,
    server: MockServer,
}

impl ChartRepo {
    pub fn start() -> Self {
        let runtime = Runtime::new().unwrap();
        let server = runtime.block_on(MockServer::start());
        Self { runtime, server }
    }

    /// Base URL of the repository rooted at `/charts`
    pub fn url(&self) -> String {
        format!("{}/charts", self.server.uri())
    }

    /// Serve `body` as the repository index, replacing previous mocks
    pub fn serve_index(&self, body: &str) {
        self.runtime.block_on(async {
            self.server.reset().await;
            Mock::given(method("GET"))
                .and(path("/charts/index.yaml"))
                .respond_with(ResponseTemplate::new(200).set_body_string(body))
                .mount(&self.server)
                .await;
        });
    }

    /// Answer the index request with `status`, replacing previous mocks
    pub fn fail_index(&self, status: u16) {
        self.runtime.block_on(async {
            self.server.reset().await;
            Mock::given(method("GET"))
                .and(path("/charts/index.yaml"))
                .respond_with(ResponseTemplate::new(status))
                .mount(&self.server)
                .await;
        });
    }

    /// Mount a custom mock without resetting
    pub fn mount(&self, mock: Mock) {
        self.runtime.block_on(mock.mount(&self.server));
    }

    pub fn reset(&self) {
        self.runtime.block_on(self.server.reset());
    }

    /// Number of requests the server has received
    pub fn request_count(&self) -> usize {
        self.runtime
            .block_on(self.server.received_requests())
            .map(|r| r.len())
            .unwrap_or(0)
    }
}

/// Source reconciler talking HTTP, recording events in memory
pub fn http_reconciler(store: &Store) -> (SourceReconciler, Arc<MemoryRecorder>) {
    let recorder = Arc::new(MemoryRecorder::new());
    let reconciler = SourceReconciler::new(
        store.clone(),
        Arc::new(HttpResolver::with_timeout(Duration::from_secs(5))),
        recorder.clone(),
    )
    .with_categories(
        Arc::new(CategoryCache::new()),
        ObjectKey::namespaced("critical-stack", "marketplace-app-categories"),
    );
    (reconciler, recorder)
}

pub const MYSQL_INDEX: &str = r#"apiVersion: v1
generated: "2020-02-03T16:32:06Z"
entries:
  mysql:
    - apiVersion: v1
      name: mysql
      version: 1.6.2
      appVersion: 5.7.28
      description: Fast, reliable, scalable, and easy to use open-source relational database system.
      urls:
        - mysql-1.6.2.tgz
      created: "2020-01-28T19:52:25.432Z"
      digest: 0f1d3b2f2a0e7c4a
    - apiVersion: v1
      name: mysql
      version: 1.6.1
      appVersion: 5.7.28
      urls:
        - mysql-1.6.1.tgz
  postgresql:
    - name: postgresql
      version: 8.1.2
      urls:
        - https://mirror.example.org/postgresql-8.1.2.tgz
"#;

/// Gzip and base64 encode a release document the way Helm stores it
pub fn encode_release(json: &str) -> String {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(json.as_bytes()).unwrap();
    STANDARD.encode(encoder.finish().unwrap())
}

pub fn release_json(name: &str, revision: i64, status: &str) -> String {
    format!(
        r#"{{
  "name": "{name}",
  "namespace": "default",
  "version": {revision},
  "info": {{
    "first_deployed": "2020-02-03T16:32:06Z",
    "last_deployed": "2020-02-03T16:32:06Z",
    "status": "{status}",
    "description": "Install complete"
  }},
  "chart": {{
    "metadata": {{"name": "{name}", "version": "1.6.2", "appVersion": "5.7.28"}},
    "templates": [{{"name": "templates/deployment.yaml", "data": "YXBpVmVyc2lvbjogdjE="}}]
  }},
  "config": {{"replicaCount": 2}},
  "manifest": "---\nkind: Deployment\n",
  "hooks": [{{
    "name": "{name}-test",
    "kind": "Pod",
    "path": "{name}/templates/tests/test.yaml",
    "events": ["test"],
    "last_run": {{"started_at": "", "completed_at": "", "phase": ""}}
  }}]
}}"#
    )
}

/// A Helm release storage secret for revision `revision` of `release`
pub fn helm_secret(release: &str, revision: i64, payload: String) -> Secret {
    let mut secret = Secret {
        metadata: ObjectMeta::namespaced("default", format!("sh.helm.release.v1.{release}.v{revision}")),
        secret_type: HELM_RELEASE_SECRET_TYPE.to_string(),
        ..Default::default()
    };
    secret.metadata.labels.insert("name".to_string(), release.to_string());
    secret.metadata.labels.insert("owner".to_string(), "helm".to_string());
    secret.metadata.labels.insert("version".to_string(), revision.to_string());
    secret.data.insert(RELEASE_DATA_KEY.to_string(), payload.into_bytes());
    secret
}
