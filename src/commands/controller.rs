// src/commands/controller.rs
//! Database setup and controller commands

use super::{format_time, open_store};
use anyhow::{Context, Result};
use marketplace::catalog::CategoryCache;
use marketplace::controller::Trigger;
use marketplace::model::{ObjectKey, Source};
use marketplace::repository::HttpResolver;
use marketplace::{Controller, ControllerConfig, SourceReconciler, Store, TracingRecorder};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::{info, warn};

/// Create the database
pub fn cmd_init(db_path: &Path) -> Result<()> {
    info!("Initializing database at: {}", db_path.display());
    Store::open(db_path)
        .with_context(|| format!("Failed to initialize database {}", db_path.display()))?;
    println!("Database initialized successfully at: {}", db_path.display());
    Ok(())
}

fn source_reconciler(store: &Store, config: &ControllerConfig) -> Result<SourceReconciler> {
    let resolver = HttpResolver::with_timeout(config.http_timeout()?);
    Ok(
        SourceReconciler::new(store.clone(), Arc::new(resolver), Arc::new(TracingRecorder))
            .with_categories(Arc::new(CategoryCache::new()), config.categories_key()),
    )
}

/// Set `stop` when the process receives Ctrl-C
fn stop_on_ctrl_c(stop: Arc<AtomicBool>) {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("Failed to start signal handler: {}", e);
                return;
            }
        };
        match runtime.block_on(tokio::signal::ctrl_c()) {
            Ok(()) => {
                info!("Received shutdown signal");
                stop.store(true, Ordering::Relaxed);
            }
            Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
        }
    });
}

/// Run the controllers until interrupted, or drain ready work with `once`
pub fn cmd_run(
    db_path: &Path,
    config: &ControllerConfig,
    once: bool,
    workers: Option<usize>,
) -> Result<()> {
    let store = open_store(db_path)?;
    let mut options = config.controller_options()?;
    if let Some(workers) = workers {
        if workers == 0 {
            anyhow::bail!("--workers must be at least 1");
        }
        options.workers = workers;
    }

    let controller = Controller::new(store.clone(), source_reconciler(&store, config)?, options);

    if once {
        let processed = controller.run_until_idle()?;
        println!("Processed {} reconcile requests", processed);
        let delayed = controller.queue().delayed_len();
        if delayed > 0 {
            println!("{} requests scheduled for later were not run", delayed);
        }
        return Ok(());
    }

    let stop = Arc::new(AtomicBool::new(false));
    stop_on_ctrl_c(Arc::clone(&stop));
    controller.run(&stop)?;
    info!("Controller stopped");
    Ok(())
}

/// Run one full synchronization cycle of a source and print its status
pub fn cmd_sync(db_path: &Path, config: &ControllerConfig, name: &str) -> Result<()> {
    let store = open_store(db_path)?;
    let key = ObjectKey::cluster(name);
    let source: Source = store.require(&key)?;
    if source.spec.skip_sync {
        println!("Source {} has sync disabled", name);
        return Ok(());
    }

    let reconciler = source_reconciler(&store, config)?;
    reconciler.reconcile(name, Trigger::Requeued)?;

    let source: Source = store.require(&key)?;
    println!("Source: {}", source.name());
    println!("  State: {}", source.status.state);
    if !source.status.reason.is_empty() {
        println!("  Reason: {}", source.status.reason);
    }
    println!("  Last update: {}", format_time(source.status.last_update.as_ref()));
    println!("  Applications: {}", source.status.app_count);
    Ok(())
}
