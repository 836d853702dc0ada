// src/commands/source.rs
//! Source management commands

use super::{format_time, open_store};
use crate::cli::SourceOptions;
use anyhow::{Context, Result};
use marketplace::controller::owned_applications;
use marketplace::duration::parse_optional_duration;
use marketplace::model::{ObjectKey, Resource, Source, SourceSpec};
use marketplace::LabelSelector;
use std::path::Path;
use tracing::info;

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn apply_options(spec: &mut SourceSpec, options: SourceOptions) -> Result<()> {
    if let Some(frequency) = options.update_frequency {
        parse_optional_duration(&frequency)
            .with_context(|| format!("Invalid update frequency '{}'", frequency))?;
        spec.update_frequency = frequency;
    }
    if options.username.is_some() {
        spec.username = non_empty(options.username);
    }
    if options.password.is_some() {
        spec.password = non_empty(options.password);
    }
    if options.cert_file.is_some() {
        spec.cert_file = non_empty(options.cert_file);
    }
    if options.key_file.is_some() {
        spec.key_file = non_empty(options.key_file);
    }
    if options.ca_file.is_some() {
        spec.ca_file = non_empty(options.ca_file);
    }

    if spec.cert_file.is_some() != spec.key_file.is_some() {
        anyhow::bail!("--cert-file and --key-file must be given together");
    }
    Ok(())
}

/// Register a new source
pub fn cmd_source_add(
    db_path: &Path,
    name: &str,
    url: &str,
    options: SourceOptions,
    skip_sync: bool,
) -> Result<()> {
    info!("Adding source: {} ({})", name, url);
    url::Url::parse(url).with_context(|| format!("Invalid repository URL '{}'", url))?;

    let store = open_store(db_path)?;
    let mut source = Source::new(name, url);
    source.spec.skip_sync = skip_sync;
    apply_options(&mut source.spec, options)?;

    let source = store.create(&source)?;
    println!("Added source: {}", source.name());
    println!("  URL: {}", source.spec.url);
    if !source.spec.update_frequency.is_empty() {
        println!("  Update frequency: {}", source.spec.update_frequency);
    }
    if source.spec.skip_sync {
        println!("  Sync: disabled");
    }
    Ok(())
}

/// List sources
pub fn cmd_source_list(db_path: &Path) -> Result<()> {
    let store = open_store(db_path)?;
    let sources: Vec<Source> = store.list(&LabelSelector::everything())?;

    if sources.is_empty() {
        println!("No sources configured");
        return Ok(());
    }

    println!("Sources:");
    for source in sources {
        let mark = if source.spec.skip_sync { "[ ]" } else { "[x]" };
        println!(
            "  {} {} ({}, {} apps, updated {})",
            mark,
            source.name(),
            source.status.state,
            source.status.app_count,
            format_time(source.status.last_update.as_ref())
        );
        println!("      {}", source.spec.url);
    }
    Ok(())
}

/// Show one source with its status
pub fn cmd_source_show(db_path: &Path, name: &str) -> Result<()> {
    let store = open_store(db_path)?;
    let source: Source = store.require(&ObjectKey::cluster(name))?;

    println!("Source: {}", source.name());
    println!("  UID: {}", source.metadata.uid);
    println!("  Generation: {}", source.metadata.generation);
    println!("  URL: {}", source.spec.url);
    println!(
        "  Update frequency: {}",
        if source.spec.update_frequency.is_empty() { "none" } else { source.spec.update_frequency.as_str() }
    );
    println!("  Skip sync: {}", source.spec.skip_sync);
    if let Some(username) = &source.spec.username {
        println!("  Username: {}", username);
    }
    if let Some(ca) = &source.spec.ca_file {
        println!("  CA file: {}", ca);
    }
    if let Some(cert) = &source.spec.cert_file {
        println!("  Client certificate: {}", cert);
    }

    println!("Status:");
    println!("  State: {}", source.status.state);
    if !source.status.reason.is_empty() {
        println!("  Reason: {}", source.status.reason);
    }
    println!("  Last update: {}", format_time(source.status.last_update.as_ref()));
    println!("  Applications: {}", source.status.app_count);

    let apps = owned_applications(&store, source.name())?;
    for app in apps {
        println!("    {} ({} versions)", app.name(), app.versions.len());
    }
    Ok(())
}

/// Change a source; the store bumps its generation, which queues a sync
pub fn cmd_source_edit(
    db_path: &Path,
    name: &str,
    url: Option<String>,
    options: SourceOptions,
    skip_sync: Option<bool>,
) -> Result<()> {
    let store = open_store(db_path)?;
    let mut source: Source = store.require(&ObjectKey::cluster(name))?;

    if let Some(url) = url {
        url::Url::parse(&url).with_context(|| format!("Invalid repository URL '{}'", url))?;
        source.spec.url = url;
    }
    if let Some(skip_sync) = skip_sync {
        source.spec.skip_sync = skip_sync;
    }
    apply_options(&mut source.spec, options)?;

    let before = source.metadata.generation;
    let source = store.update(&source)?;
    if source.metadata.generation == before {
        println!("Source {} unchanged", source.name());
    } else {
        info!("Source {} now at generation {}", source.name(), source.metadata.generation);
        println!("Updated source: {} (generation {})", source.name(), source.metadata.generation);
    }
    Ok(())
}

/// Remove a source; its applications are garbage collected with it
pub fn cmd_source_remove(db_path: &Path, name: &str) -> Result<()> {
    let store = open_store(db_path)?;
    let key = ObjectKey::cluster(name);
    let owned = owned_applications(&store, name)?.len();

    if !store.delete::<Source>(&key)? {
        anyhow::bail!("Source '{}' not found", name);
    }
    println!("Removed source: {} ({} applications removed)", name, owned);
    Ok(())
}
