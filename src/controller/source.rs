// src/controller/source.rs

//! Source synchronization
//!
//! One cycle per Source:
//!
//! 1. A changed Source is first marked `updating` and requeued, so clients
//!    see the change was noticed before any network traffic happens.
//! 2. The repository index is fetched with the Source's credentials.
//! 3. Every package is merged into its Application record.
//! 4. The outcome is written to the Source status together with the number
//!    of Applications it owns.
//!
//! Failures to reach or parse the repository end up in the status, not in
//! the returned error. Only store failures are returned, for the scheduler
//! to retry with backoff.

use crate::catalog::{CategoryCache, DEFAULT_CATEGORIES_NAME, DEFAULT_CATEGORIES_NAMESPACE, merge_application};
use crate::duration::parse_optional_duration;
use crate::error::{Error, Result};
use crate::events::{EventRecorder, EventTarget, EventType};
use crate::model::{
    Application, ObjectKey, Resource, Source, SourceStatus, SyncState, labels, set_controller_reference,
};
use crate::repository::{Credentials, IndexFile, TransportResolver, fetch_index};
use crate::store::{LabelSelector, OpResult, Store};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{Action, Trigger, count_owned};

/// Operation names used as status event reasons
pub mod op {
    pub const RECONCILE: &str = "Reconcile";
    pub const SYNC_REPO: &str = "SyncRepo";
    pub const LIST_APPS: &str = "ListApps";
    pub const APP_UPDATE: &str = "AppUpdate";
}

pub struct SourceReconciler {
    store: Store,
    resolver: Arc<dyn TransportResolver>,
    recorder: Arc<dyn EventRecorder>,
    categories: Arc<CategoryCache>,
    categories_key: ObjectKey,
}

impl SourceReconciler {
    pub fn new(store: Store, resolver: Arc<dyn TransportResolver>, recorder: Arc<dyn EventRecorder>) -> Self {
        Self {
            store,
            resolver,
            recorder,
            categories: Arc::new(CategoryCache::new()),
            categories_key: ObjectKey::namespaced(DEFAULT_CATEGORIES_NAMESPACE, DEFAULT_CATEGORIES_NAME),
        }
    }

    /// Use `cache`, refreshed from the ConfigMap at `key`, as the category overlay
    pub fn with_categories(mut self, cache: Arc<CategoryCache>, key: ObjectKey) -> Self {
        self.categories = cache;
        self.categories_key = key;
        self
    }

    pub fn categories(&self) -> &Arc<CategoryCache> {
        &self.categories
    }

    pub fn reconcile(&self, name: &str, trigger: Trigger) -> Result<Action> {
        let key = ObjectKey::cluster(name);
        let Some(source) = self.store.get::<Source>(&key)? else {
            debug!("Source {} no longer exists", name);
            return Ok(Action::AwaitChange);
        };

        if source.spec.skip_sync {
            debug!("Source {} has skipSync set", name);
            return Ok(Action::AwaitChange);
        }

        self.categories.refresh(&self.store, &self.categories_key);

        if trigger == Trigger::Changed && source.status.state != SyncState::Updating {
            self.set_status(&source, op::RECONCILE, SourceStatus::updating("object changed"))?;
            return Ok(Action::Requeue);
        }

        self.sync(&source)
    }

    fn sync(&self, source: &Source) -> Result<Action> {
        let interval = match parse_optional_duration(&source.spec.update_frequency) {
            Ok(interval) => interval,
            Err(e) => {
                let reason = format!("spec.updateFrequency is invalid: {e}");
                self.set_status(source, op::RECONCILE, SourceStatus::error(reason, None))?;
                return Ok(Action::AwaitChange);
            }
        };
        let next = || next_run(source.name(), interval);

        let credentials = Credentials::from_spec(&source.spec);
        let client = match self.resolver.resolve(&source.spec.url, &credentials) {
            Ok(client) => client,
            Err(e) => {
                self.set_status(source, op::SYNC_REPO, SourceStatus::error(e.to_string(), None))?;
                return Ok(next());
            }
        };

        let start = Utc::now();
        info!("Synchronizing source {} from {}", source.name(), source.spec.url);

        let index = match fetch_index(client.as_ref(), &source.spec.url) {
            Ok(index) => index,
            Err(e) => {
                warn!("Failed to load index for source {}: {}", source.name(), e);
                self.set_status(source, op::SYNC_REPO, SourceStatus::error(e.to_string(), Some(start)))?;
                return Ok(next());
            }
        };

        let existing = match self.existing_applications(source) {
            Ok(existing) => existing,
            Err(e) => {
                self.set_status(source, op::LIST_APPS, SourceStatus::error(e.to_string(), Some(start)))?;
                return Ok(next());
            }
        };

        if let Err(e) = self.apply_index(source, &index, &existing) {
            warn!("Failed to update applications of source {}: {}", source.name(), e);
            self.set_status(source, op::APP_UPDATE, SourceStatus::error(e.to_string(), Some(start)))?;
            return Ok(next());
        }

        self.set_status(source, op::RECONCILE, SourceStatus::success(start))?;
        Ok(next())
    }

    fn existing_applications(&self, source: &Source) -> Result<HashMap<String, Application>> {
        let selector = LabelSelector::everything().eq(labels::SOURCE_NAME, source.name());
        let apps: Vec<Application> = self.store.list(&selector)?;
        Ok(apps.into_iter().map(|a| (a.name().to_string(), a)).collect())
    }

    /// Merge every package of `index` into its Application, writing only
    /// records that change
    fn apply_index(&self, source: &Source, index: &IndexFile, existing: &HashMap<String, Application>) -> Result<()> {
        let target = EventTarget::new(Source::KIND, source.key());
        let mut created = 0usize;
        let mut updated = 0usize;

        for (package, versions) in &index.entries {
            if versions.is_empty() {
                continue;
            }

            let categories = self.categories.categories_for(package);
            let identity = Application::identity(source.name(), package);

            if let Some(current) = existing.get(&identity) {
                let mut preview = current.clone();
                let outcome = merge_application(&mut preview, &categories, versions, &source.spec.url);
                if !outcome.needs_write() && is_controlled_by(current, source) {
                    continue;
                }
            }

            let seed = Application::for_package(source.name(), package);
            let mut appended = Vec::new();
            let (_, result) = self.store.create_or_update(&seed, |app| {
                set_controller_reference(source, &mut app.metadata)?;
                if app.app_name.is_empty() {
                    app.app_name = package.clone();
                }
                appended = merge_application(app, &categories, versions, &source.spec.url).appended;
                Ok(())
            })?;

            match result {
                OpResult::Created => {
                    created += 1;
                    self.recorder
                        .publish(&target, EventType::Normal, op::APP_UPDATE, &format!("new app: {package}"));
                }
                OpResult::Updated => {
                    updated += 1;
                    for version in &appended {
                        self.recorder.publish(
                            &target,
                            EventType::Normal,
                            op::APP_UPDATE,
                            &format!("new version found: {package} {version}"),
                        );
                    }
                }
                OpResult::Unchanged => {}
            }
        }

        info!(
            "Source {}: {} packages in index, {} applications created, {} updated",
            source.name(),
            index.package_count(),
            created,
            updated
        );
        Ok(())
    }

    /// Write `status` with a fresh owned-application count and emit the
    /// matching event
    fn set_status(&self, source: &Source, operation: &str, mut status: SourceStatus) -> Result<()> {
        status.app_count = count_owned(&self.store, source.name())?;

        match self.store.patch_status::<Source>(&source.key(), &status) {
            Ok(_) => {}
            Err(Error::NotFoundError(_)) => {
                debug!("Source {} was deleted before its status could be written", source.name());
                return Ok(());
            }
            Err(e) => return Err(Error::StoreError(format!("failed during status update: {e}"))),
        }

        let target = EventTarget::new(Source::KIND, source.key());
        if status.state == SyncState::Error {
            self.recorder.publish(&target, EventType::Warning, operation, &status.reason);
        } else {
            self.recorder.publish(&target, EventType::Normal, operation, "done");
        }
        Ok(())
    }
}

fn is_controlled_by(app: &Application, source: &Source) -> bool {
    app.metadata
        .controller()
        .is_some_and(|owner| owner.uid == source.metadata.uid)
}

fn next_run(source: &str, interval: Option<Duration>) -> Action {
    match interval {
        Some(interval) => {
            info!("Next run of source {} in {:?}", source, interval);
            Action::RequeueAfter(interval)
        }
        None => Action::AwaitChange,
    }
}
