// src/commands/app.rs
//! Application catalog commands

use super::open_store;
use anyhow::Result;
use marketplace::LabelSelector;
use marketplace::model::{Application, ChartVersion, ObjectKey, labels};
use marketplace::repository::parse_version;
use std::path::Path;

/// Highest recorded version; versions are kept in first-seen order
fn latest(app: &Application) -> Option<&ChartVersion> {
    app.versions.iter().max_by(|a, b| {
        match (parse_version(a.version()), parse_version(b.version())) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Greater,
            (None, Some(_)) => std::cmp::Ordering::Less,
            (None, None) => a.version().cmp(b.version()),
        }
    })
}

/// List applications, optionally filtered by source and category
pub fn cmd_app_list(db_path: &Path, source: Option<&str>, category: Option<&str>) -> Result<()> {
    let store = open_store(db_path)?;

    let mut selector = LabelSelector::everything();
    if let Some(source) = source {
        selector = selector.eq(labels::SOURCE_NAME, source);
    }
    if let Some(category) = category {
        selector = selector.exists(labels::category_label(&category.to_lowercase()));
    }
    let apps: Vec<Application> = store.list(&selector)?;

    if apps.is_empty() {
        println!("No applications found");
        return Ok(());
    }

    for app in &apps {
        let version = latest(app).map(ChartVersion::version).unwrap_or("-");
        let mut line = format!("{} {} ({} versions)", app.name(), version, app.versions.len());
        let categories = app.categories();
        if !categories.is_empty() {
            line.push_str(&format!(" [{}]", categories.join(", ")));
        }
        if app.is_deprecated() {
            line.push_str(" DEPRECATED");
        }
        println!("{}", line);
    }
    println!("\nTotal: {} applications", apps.len());
    Ok(())
}

/// Show one application with every version
pub fn cmd_app_show(db_path: &Path, name: &str) -> Result<()> {
    let store = open_store(db_path)?;
    let app: Application = store.require(&ObjectKey::cluster(name))?;

    println!("Application: {}", app.name());
    println!("  Package: {}", app.app_name);
    if let Some(source) = app.source_name() {
        println!("  Source: {}", source);
    }
    let categories = app.categories();
    if !categories.is_empty() {
        println!("  Categories: {}", categories.join(", "));
    }
    println!("  Deprecated: {}", app.is_deprecated());

    println!("  Versions:");
    for version in &app.versions {
        let mut line = format!("    {}", version.version());
        if !version.metadata.app_version.is_empty() {
            line.push_str(&format!(" (app {})", version.metadata.app_version));
        }
        if version.is_deprecated() {
            line.push_str(" deprecated");
        }
        println!("{}", line);
        for url in &version.urls {
            println!("      {}", url);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app_with(versions: &[&str]) -> Application {
        let mut app = Application::for_package("stable", "mysql");
        for v in versions {
            let mut chart = ChartVersion::default();
            chart.metadata.version = v.to_string();
            app.versions.push(chart);
        }
        app
    }

    #[test]
    fn test_latest_prefers_highest_semver() {
        let app = app_with(&["1.6.2", "1.10.0", "nightly", "1.7.0"]);
        assert_eq!(latest(&app).unwrap().version(), "1.10.0");
        assert!(latest(&app_with(&[])).is_none());
    }
}
