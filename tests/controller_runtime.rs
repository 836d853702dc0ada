// tests/controller_runtime.rs

//! The host scheduler driving both reconcilers against a persistent store

mod common;

use common::{ChartRepo, MYSQL_INDEX, encode_release, helm_secret, release_json, sqlite_store};
use marketplace::catalog::CategoryCache;
use marketplace::model::{Application, ObjectKey, Release, Source, SyncState};
use marketplace::repository::HttpResolver;
use marketplace::{
    Controller, ControllerOptions, LabelSelector, MemoryRecorder, SourceReconciler, Store,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

fn controller(store: &Store, options: ControllerOptions) -> Controller {
    let sources = SourceReconciler::new(
        store.clone(),
        Arc::new(HttpResolver::with_timeout(Duration::from_secs(5))),
        Arc::new(MemoryRecorder::new()),
    )
    .with_categories(
        Arc::new(CategoryCache::new()),
        ObjectKey::namespaced("critical-stack", "marketplace-app-categories"),
    );
    Controller::new(store.clone(), sources, options)
}

fn apps(store: &Store) -> Vec<Application> {
    store.list(&LabelSelector::everything()).unwrap()
}

#[test]
fn test_source_lifecycle() {
    let repo = ChartRepo::start();
    repo.serve_index(MYSQL_INDEX);
    let (_dir, store) = sqlite_store();
    let ctl = controller(&store, ControllerOptions::default());

    store.create(&Source::new("stable", repo.url())).unwrap();
    assert_eq!(ctl.run_until_idle().unwrap(), 2);
    assert_eq!(apps(&store).len(), 2);
    assert_eq!(repo.request_count(), 1);

    // nothing changed, nothing to do
    assert_eq!(ctl.run_until_idle().unwrap(), 0);

    // an edit bumps the generation and triggers a new cycle
    let mut source: Source = store.require(&ObjectKey::cluster("stable")).unwrap();
    source.spec.update_frequency = "1h".to_string();
    store.update(&source).unwrap();
    assert_eq!(ctl.run_until_idle().unwrap(), 2);
    assert_eq!(repo.request_count(), 2);
    assert_eq!(ctl.queue().delayed_len(), 1);

    // removing the source garbage collects its applications
    assert!(store.delete::<Source>(&ObjectKey::cluster("stable")).unwrap());
    assert!(apps(&store).is_empty());
}

#[test]
fn test_skip_sync_source_is_left_alone() {
    let repo = ChartRepo::start();
    repo.serve_index(MYSQL_INDEX);
    let (_dir, store) = sqlite_store();
    let ctl = controller(&store, ControllerOptions::default());

    let mut source = Source::new("frozen", repo.url());
    source.spec.skip_sync = true;
    store.create(&source).unwrap();

    assert_eq!(ctl.run_until_idle().unwrap(), 1);
    let source: Source = store.require(&ObjectKey::cluster("frozen")).unwrap();
    assert_eq!(source.status.state, SyncState::Unknown);
    assert_eq!(repo.request_count(), 0);
}

#[test]
fn test_run_processes_sources_and_releases_until_stopped() {
    let repo = ChartRepo::start();
    repo.serve_index(MYSQL_INDEX);
    let (_dir, store) = sqlite_store();
    let ctl = controller(
        &store,
        ControllerOptions {
            workers: 3,
            watch_interval: Duration::from_millis(50),
        },
    );
    let stop = AtomicBool::new(false);

    store.create(&Source::new("stable", repo.url())).unwrap();

    thread::scope(|scope| {
        scope.spawn(|| {
            // records written while the controller runs are picked up by the watcher
            thread::sleep(Duration::from_millis(100));
            store
                .create(&helm_secret("wordpress", 1, encode_release(&release_json("wordpress", 1, "deployed"))))
                .unwrap();

            let deadline = Instant::now() + Duration::from_secs(10);
            while Instant::now() < deadline {
                let source: Source = store.require(&ObjectKey::cluster("stable")).unwrap();
                let releases: Vec<Release> = store.list(&LabelSelector::everything()).unwrap();
                if source.status.state == SyncState::Success && !releases.is_empty() {
                    break;
                }
                thread::sleep(Duration::from_millis(25));
            }
            stop.store(true, Ordering::Relaxed);
        });

        ctl.run(&stop).unwrap();
    });

    let source: Source = store.require(&ObjectKey::cluster("stable")).unwrap();
    assert_eq!(source.status.state, SyncState::Success);
    assert_eq!(source.status.app_count, 2);
    let releases: Vec<Release> = store.list(&LabelSelector::everything()).unwrap();
    assert_eq!(releases.len(), 1);
}
