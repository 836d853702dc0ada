// src/controller/runtime.rs

//! Host scheduler
//!
//! Polls the store for new or changed Sources and Helm release Secrets,
//! feeds them through a [`WorkQueue`] and runs the matching reconciler on a
//! fixed pool of worker threads. Reconcile errors are retried with
//! exponential backoff per request.

use crate::error::Result;
use crate::model::{ObjectKey, Secret, Source};
use crate::store::{LabelSelector, Store};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{Action, ReleaseReconciler, Request, SourceReconciler, Trigger, WorkQueue};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Longest uninterrupted sleep of the watcher, so a stop request is noticed
const STOP_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Reconciles running in parallel
    pub workers: usize,
    /// Pause between store scans
    pub watch_interval: Duration,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            workers: 2,
            watch_interval: Duration::from_secs(2),
        }
    }
}

/// Last observed version of each watched record
#[derive(Default)]
struct WatchState {
    /// Source name -> (uid, generation)
    sources: HashMap<String, (String, u64)>,
    /// Secret key -> (uid, resource version)
    secrets: HashMap<ObjectKey, (String, u64)>,
}

pub struct Controller {
    store: Store,
    sources: SourceReconciler,
    releases: ReleaseReconciler,
    queue: WorkQueue<Request>,
    watched: Mutex<WatchState>,
    failures: Mutex<HashMap<Request, u32>>,
    options: ControllerOptions,
}

impl Controller {
    pub fn new(store: Store, sources: SourceReconciler, options: ControllerOptions) -> Self {
        Self {
            releases: ReleaseReconciler::new(store.clone()),
            store,
            sources,
            queue: WorkQueue::new(),
            watched: Mutex::new(WatchState::default()),
            failures: Mutex::new(HashMap::new()),
            options,
        }
    }

    pub fn queue(&self) -> &WorkQueue<Request> {
        &self.queue
    }

    /// Queue every Source whose generation moved and every Helm release
    /// Secret that was written since the previous scan
    ///
    /// Returns the number of requests queued.
    pub fn scan(&self) -> Result<usize> {
        let sources: Vec<Source> = self.store.list(&LabelSelector::everything())?;
        let secrets: Vec<Secret> = self.store.list(&LabelSelector::everything())?;

        let mut watched = self.watched.lock();
        let mut queued = 0;

        let mut live_sources = HashMap::with_capacity(sources.len());
        for source in sources {
            let seen = (source.metadata.uid.clone(), source.metadata.generation);
            if watched.sources.get(source.name()) != Some(&seen) {
                debug!("Source {} changed (generation {})", source.name(), seen.1);
                self.queue.add(Request::Source(source.name().to_string()), Trigger::Changed);
                queued += 1;
            }
            live_sources.insert(source.name().to_string(), seen);
        }
        watched.sources = live_sources;

        let mut live_secrets = HashMap::new();
        for secret in secrets.into_iter().filter(Secret::is_helm_release) {
            let key = secret.metadata.key();
            let seen = (secret.metadata.uid.clone(), secret.metadata.resource_version);
            if watched.secrets.get(&key) != Some(&seen) {
                debug!("Release secret {} changed", key);
                self.queue.add(Request::Release(key.clone()), Trigger::Changed);
                queued += 1;
            }
            live_secrets.insert(key, seen);
        }
        watched.secrets = live_secrets;

        Ok(queued)
    }

    fn reconcile(&self, request: &Request, trigger: Trigger) -> Result<Action> {
        match request {
            Request::Source(name) => self.sources.reconcile(name, trigger),
            Request::Release(key) => self.releases.reconcile(key),
        }
    }

    /// Run one request and schedule its follow-up
    pub fn process(&self, request: Request, trigger: Trigger) {
        let result = self.reconcile(&request, trigger);
        self.queue.done(&request);

        match result {
            Ok(action) => {
                self.failures.lock().remove(&request);
                match action {
                    Action::Requeue => self.queue.add(request, Trigger::Requeued),
                    Action::RequeueAfter(delay) => self.queue.add_after(request, Trigger::Scheduled, delay),
                    Action::AwaitChange => {}
                }
            }
            Err(e) => {
                let delay = self.next_backoff(&request);
                warn!("Reconcile of {} failed, retrying in {:?}: {}", request, delay, e);
                self.queue.add_after(request, trigger, delay);
            }
        }
    }

    fn next_backoff(&self, request: &Request) -> Duration {
        let mut failures = self.failures.lock();
        let attempts = failures.entry(request.clone()).or_insert(0);
        *attempts += 1;
        backoff(*attempts)
    }

    /// Scan once and process until nothing is ready to run
    ///
    /// Delayed requests are left queued. Returns the number of reconciles run.
    pub fn run_until_idle(&self) -> Result<usize> {
        let mut processed = 0;
        self.scan()?;
        loop {
            while let Some((request, trigger)) = self.queue.try_get() {
                self.process(request, trigger);
                processed += 1;
            }
            // reconciles may have created records that need a pass of their own
            self.scan()?;
            if self.queue.is_empty() {
                return Ok(processed);
            }
        }
    }

    /// Run the watcher and workers until `stop` is set
    pub fn run(&self, stop: &AtomicBool) -> Result<()> {
        self.scan()?;
        let workers = self.options.workers.max(1);
        info!(
            "Controller started with {} workers, scanning every {:?}",
            workers, self.options.watch_interval
        );

        thread::scope(|scope| {
            for id in 0..workers {
                scope.spawn(move || self.worker(id));
            }

            while !stop.load(Ordering::Relaxed) {
                sleep_unless_stopped(self.options.watch_interval, stop);
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                if let Err(e) = self.scan() {
                    warn!("Store scan failed: {}", e);
                }
            }

            info!("Stopping controller");
            self.queue.shutdown();
        });

        Ok(())
    }

    fn worker(&self, id: usize) {
        debug!("Worker {} started", id);
        while let Some((request, trigger)) = self.queue.get() {
            debug!("Worker {} processing {} ({:?})", id, request, trigger);
            self.process(request, trigger);
        }
        debug!("Worker {} stopped", id);
    }
}

/// Delay before retry number `attempt` (1-based)
fn backoff(attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
    INITIAL_BACKOFF.saturating_mul(factor).min(MAX_BACKOFF)
}

fn sleep_unless_stopped(total: Duration, stop: &AtomicBool) {
    let mut remaining = total;
    while !remaining.is_zero() && !stop.load(Ordering::Relaxed) {
        let slice = remaining.min(STOP_POLL);
        thread::sleep(slice);
        remaining -= slice;
    }
}
