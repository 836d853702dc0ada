// src/commands/mod.rs
//! Command handlers for the marketplace CLI

mod app;
mod categories;
mod controller;
mod release;
mod source;

pub use app::{cmd_app_list, cmd_app_show};
pub use categories::{cmd_categories_import, cmd_categories_show};
pub use controller::{cmd_init, cmd_run, cmd_sync};
pub use release::{cmd_release_decode, cmd_release_list, cmd_release_show, cmd_secret_import};
pub use source::{cmd_source_add, cmd_source_edit, cmd_source_list, cmd_source_remove, cmd_source_show};

use anyhow::{Context, Result};
use marketplace::Store;
use std::path::Path;

/// Open an existing database
pub(crate) fn open_store(db_path: &Path) -> Result<Store> {
    if !db_path.exists() {
        anyhow::bail!(
            "Database not found at {}; run 'marketplace init' first",
            db_path.display()
        );
    }
    Store::open(db_path).with_context(|| format!("Failed to open database {}", db_path.display()))
}

/// Render an optional timestamp for listings
pub(crate) fn format_time(time: Option<&chrono::DateTime<chrono::Utc>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string())
}
