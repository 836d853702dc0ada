// tests/source_sync.rs

//! Source synchronization against a real HTTP chart repository

mod common;

use common::{ChartRepo, MYSQL_INDEX, http_reconciler, sqlite_store};
use marketplace::controller::{Action, Trigger, op};
use marketplace::events::EventType;
use marketplace::model::{Application, ChartVersion, ConfigMap, ObjectKey, ObjectMeta, Source, SyncState};
use marketplace::{LabelSelector, Store};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

fn add_source(store: &Store, name: &str, url: &str) -> Source {
    store.create(&Source::new(name, url)).unwrap()
}

fn status(store: &Store, name: &str) -> marketplace::model::SourceStatus {
    store.require::<Source>(&ObjectKey::cluster(name)).unwrap().status
}

fn versions(app: &Application) -> Vec<&str> {
    app.versions.iter().map(ChartVersion::version).collect()
}

#[test]
fn test_sync_creates_applications_from_index() {
    let repo = ChartRepo::start();
    repo.serve_index(MYSQL_INDEX);
    let (_dir, store) = sqlite_store();
    let (reconciler, recorder) = http_reconciler(&store);
    add_source(&store, "stable", &repo.url());

    // the first pass only acknowledges the change
    assert_eq!(reconciler.reconcile("stable", Trigger::Changed).unwrap(), Action::Requeue);
    assert_eq!(repo.request_count(), 0);
    assert_eq!(status(&store, "stable").state, SyncState::Updating);

    assert_eq!(reconciler.reconcile("stable", Trigger::Requeued).unwrap(), Action::AwaitChange);
    assert_eq!(repo.request_count(), 1);

    let st = status(&store, "stable");
    assert_eq!(st.state, SyncState::Success);
    assert_eq!(st.app_count, 2);
    assert!(st.last_update.is_some());

    let mysql: Application = store.require(&ObjectKey::cluster("stable.mysql")).unwrap();
    assert_eq!(mysql.app_name, "mysql");
    assert_eq!(versions(&mysql), vec!["1.6.2", "1.6.1"]);
    assert_eq!(mysql.versions[0].urls, vec![format!("{}/mysql-1.6.2.tgz", repo.url())]);
    assert_eq!(mysql.versions[0].metadata.app_version, "5.7.28");
    assert_eq!(mysql.source_name(), Some("stable"));

    let postgres: Application = store.require(&ObjectKey::cluster("stable.postgresql")).unwrap();
    assert_eq!(postgres.versions[0].urls, vec!["https://mirror.example.org/postgresql-8.1.2.tgz"]);

    let mut created = recorder.messages(op::APP_UPDATE);
    created.sort();
    assert_eq!(created, vec!["new app: mysql", "new app: postgresql"]);
    assert_eq!(recorder.messages(op::RECONCILE), vec!["done", "done"]);
}

#[test]
fn test_resync_appends_only_new_versions() {
    let repo = ChartRepo::start();
    repo.serve_index(MYSQL_INDEX);
    let (_dir, store) = sqlite_store();
    let (reconciler, recorder) = http_reconciler(&store);
    add_source(&store, "stable", &repo.url());
    reconciler.reconcile("stable", Trigger::Requeued).unwrap();

    let before: Application = store.require(&ObjectKey::cluster("stable.mysql")).unwrap();

    // the repository dropped 1.6.1 and published 1.7.0
    repo.serve_index(
        r#"apiVersion: v1
entries:
  mysql:
    - name: mysql
      version: 1.7.0
      urls: [mysql-1.7.0.tgz]
    - name: mysql
      version: 1.6.2
      description: rewritten upstream
      urls: [mysql-1.6.2.tgz]
"#,
    );
    recorder.clear();
    reconciler.reconcile("stable", Trigger::Scheduled).unwrap();

    let after: Application = store.require(&ObjectKey::cluster("stable.mysql")).unwrap();
    assert_eq!(versions(&after), vec!["1.6.2", "1.6.1", "1.7.0"]);
    assert_eq!(after.versions[0], before.versions[0], "recorded versions are never rewritten");
    assert_eq!(recorder.messages(op::APP_UPDATE), vec!["new version found: mysql 1.7.0"]);

    // nothing new: no writes at all
    let rv = after.metadata.resource_version;
    reconciler.reconcile("stable", Trigger::Scheduled).unwrap();
    let again: Application = store.require(&ObjectKey::cluster("stable.mysql")).unwrap();
    assert_eq!(again.metadata.resource_version, rv);
}

#[test]
fn test_basic_auth_credentials_are_sent() {
    let repo = ChartRepo::start();
    repo.mount(
        Mock::given(method("GET"))
            .and(path("/charts/index.yaml"))
            .and(header("authorization", "Basic YWRtaW46c2VjcmV0"))
            .respond_with(ResponseTemplate::new(200).set_body_string(MYSQL_INDEX)),
    );
    repo.mount(
        Mock::given(method("GET"))
            .and(path("/charts/index.yaml"))
            .respond_with(ResponseTemplate::new(401)),
    );

    let (_dir, store) = sqlite_store();
    let (reconciler, _) = http_reconciler(&store);

    add_source(&store, "anonymous", &repo.url());
    reconciler.reconcile("anonymous", Trigger::Requeued).unwrap();
    let st = status(&store, "anonymous");
    assert_eq!(st.state, SyncState::Error);
    assert!(st.reason.contains("401"), "{}", st.reason);

    let mut private = Source::new("private", repo.url());
    private.spec.username = Some("admin".to_string());
    private.spec.password = Some("secret".to_string());
    store.create(&private).unwrap();
    reconciler.reconcile("private", Trigger::Requeued).unwrap();
    assert_eq!(status(&store, "private").state, SyncState::Success);
    assert_eq!(status(&store, "private").app_count, 2);
}

#[test]
fn test_unreachable_index_is_recorded_and_rescheduled() {
    let repo = ChartRepo::start();
    repo.fail_index(404);
    let (_dir, store) = sqlite_store();
    let (reconciler, recorder) = http_reconciler(&store);

    let mut source = Source::new("stable", repo.url());
    source.spec.update_frequency = "15m".to_string();
    store.create(&source).unwrap();

    let action = reconciler.reconcile("stable", Trigger::Requeued).unwrap();
    assert_eq!(action, Action::RequeueAfter(Duration::from_secs(900)));

    let st = status(&store, "stable");
    assert_eq!(st.state, SyncState::Error);
    assert!(st.reason.contains("404"));
    assert!(st.last_update.is_some());
    assert_eq!(st.app_count, 0);

    let warning = recorder.events().pop().unwrap();
    assert_eq!(warning.event_type, EventType::Warning);
    assert_eq!(warning.reason, op::SYNC_REPO);

    // the repository recovers on the next scheduled run
    repo.serve_index(MYSQL_INDEX);
    reconciler.reconcile("stable", Trigger::Scheduled).unwrap();
    assert_eq!(status(&store, "stable").state, SyncState::Success);
}

#[test]
fn test_index_without_api_version_is_parse_error() {
    let repo = ChartRepo::start();
    repo.serve_index("entries:\n  mysql: []\n");
    let (_dir, store) = sqlite_store();
    let (reconciler, _) = http_reconciler(&store);
    add_source(&store, "stable", &repo.url());

    reconciler.reconcile("stable", Trigger::Requeued).unwrap();
    let st = status(&store, "stable");
    assert_eq!(st.state, SyncState::Error);
    assert!(st.reason.contains("no API version"));
}

#[test]
fn test_invalid_update_frequency_never_fetches() {
    let repo = ChartRepo::start();
    repo.serve_index(MYSQL_INDEX);
    let (_dir, store) = sqlite_store();
    let (reconciler, _) = http_reconciler(&store);

    let mut source = Source::new("stable", repo.url());
    source.spec.update_frequency = "fortnightly".to_string();
    store.create(&source).unwrap();

    assert_eq!(reconciler.reconcile("stable", Trigger::Requeued).unwrap(), Action::AwaitChange);
    let st = status(&store, "stable");
    assert_eq!(st.state, SyncState::Error);
    assert!(st.reason.contains("invalid"));
    assert_eq!(repo.request_count(), 0);
}

#[test]
fn test_category_overlay_is_inverted_onto_labels() {
    let repo = ChartRepo::start();
    repo.serve_index(MYSQL_INDEX);
    let (_dir, store) = sqlite_store();
    let (reconciler, _) = http_reconciler(&store);

    let mut overlay = ConfigMap {
        metadata: ObjectMeta::namespaced("critical-stack", "marketplace-app-categories"),
        ..Default::default()
    };
    overlay.data.insert(
        "categories.yaml".to_string(),
        "db: [mysql, postgresql]\ncache: [mysql]\n".to_string(),
    );
    store.create(&overlay).unwrap();

    add_source(&store, "stable", &repo.url());
    reconciler.reconcile("stable", Trigger::Requeued).unwrap();

    let mysql: Application = store.require(&ObjectKey::cluster("stable.mysql")).unwrap();
    let mut categories = mysql.categories();
    categories.sort();
    assert_eq!(categories, vec!["cache", "db"]);

    let by_category: Vec<Application> = store
        .list(&LabelSelector::everything().exists("marketplace.criticalstack.com/application.category.db"))
        .unwrap();
    assert_eq!(by_category.len(), 2);
}

#[test]
fn test_same_package_in_two_sources_gets_two_records() {
    let repo = ChartRepo::start();
    repo.serve_index(MYSQL_INDEX);
    let (_dir, store) = sqlite_store();
    let (reconciler, _) = http_reconciler(&store);

    add_source(&store, "stable", &repo.url());
    add_source(&store, "mirror", &repo.url());
    reconciler.reconcile("stable", Trigger::Requeued).unwrap();
    reconciler.reconcile("mirror", Trigger::Requeued).unwrap();

    let apps: Vec<Application> = store
        .list(&LabelSelector::everything().eq("marketplace.criticalstack.com/application.name", "mysql"))
        .unwrap();
    let mut names: Vec<&str> = apps.iter().map(Application::name).collect();
    names.sort();
    assert_eq!(names, vec!["mirror.mysql", "stable.mysql"]);
    assert_eq!(status(&store, "mirror").app_count, 2);
}
