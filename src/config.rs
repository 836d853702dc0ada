// src/config.rs
//! Configuration file parsing for the controller
//!
//! TOML file with the following sections, every field optional:
//! - top level `database` - path of the SQLite store
//! - [categories] - where the category overlay ConfigMap lives
//! - [controller] - worker count, store scan interval, HTTP timeout
//! - [logging] - default level and output format

use crate::catalog::{DEFAULT_CATEGORIES_NAME, DEFAULT_CATEGORIES_NAMESPACE};
use crate::controller::ControllerOptions;
use crate::duration::parse_duration;
use crate::error::{Error, Result};
use crate::model::ObjectKey;
use crate::repository::HTTP_TIMEOUT;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DATABASE_PATH: &str = "/var/lib/marketplace/marketplace.db";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/marketplace/config.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControllerConfig {
    #[serde(default = "default_database")]
    pub database: PathBuf,

    #[serde(default)]
    pub categories: CategoriesSection,

    #[serde(default)]
    pub controller: ControllerSection,

    #[serde(default)]
    pub logging: LoggingSection,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            categories: CategoriesSection::default(),
            controller: ControllerSection::default(),
            logging: LoggingSection::default(),
        }
    }
}

fn default_database() -> PathBuf {
    PathBuf::from(DEFAULT_DATABASE_PATH)
}

/// Location of the category overlay ConfigMap
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoriesSection {
    #[serde(default = "default_categories_namespace")]
    pub namespace: String,

    #[serde(default = "default_categories_name")]
    pub name: String,
}

impl Default for CategoriesSection {
    fn default() -> Self {
        Self {
            namespace: default_categories_namespace(),
            name: default_categories_name(),
        }
    }
}

fn default_categories_namespace() -> String {
    DEFAULT_CATEGORIES_NAMESPACE.to_string()
}

fn default_categories_name() -> String {
    DEFAULT_CATEGORIES_NAME.to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControllerSection {
    /// Reconciles running in parallel
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Pause between store scans (e.g., "2s", "500ms")
    #[serde(default = "default_watch_interval")]
    pub watch_interval: String,

    /// Timeout of each repository HTTP request (e.g., "30s")
    #[serde(default = "default_http_timeout")]
    pub http_timeout: String,
}

impl Default for ControllerSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            watch_interval: default_watch_interval(),
            http_timeout: default_http_timeout(),
        }
    }
}

fn default_workers() -> usize {
    2
}

fn default_watch_interval() -> String {
    "2s".to_string()
}

fn default_http_timeout() -> String {
    format!("{}s", HTTP_TIMEOUT.as_secs())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(Error::ConfigError(format!(
                "log format must be one of \"text\" or \"json\", got {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Default filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ControllerConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("failed to read config file {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
            .map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))
    }

    /// Load `path` when it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: ControllerConfig =
            toml::from_str(content).map_err(|e| Error::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.controller.workers == 0 {
            return Err(Error::ConfigError("controller.workers must be at least 1".to_string()));
        }
        if self.categories.name.is_empty() {
            return Err(Error::ConfigError("categories.name must not be empty".to_string()));
        }
        self.watch_interval()?;
        self.http_timeout()?;
        Ok(())
    }

    pub fn watch_interval(&self) -> Result<Duration> {
        let interval = parse_duration(&self.controller.watch_interval)
            .map_err(|e| Error::ConfigError(format!("controller.watch_interval: {e}")))?;
        if interval.is_zero() {
            return Err(Error::ConfigError("controller.watch_interval must be positive".to_string()));
        }
        Ok(interval)
    }

    pub fn http_timeout(&self) -> Result<Duration> {
        let timeout = parse_duration(&self.controller.http_timeout)
            .map_err(|e| Error::ConfigError(format!("controller.http_timeout: {e}")))?;
        if timeout.is_zero() {
            return Err(Error::ConfigError("controller.http_timeout must be positive".to_string()));
        }
        Ok(timeout)
    }

    pub fn categories_key(&self) -> ObjectKey {
        ObjectKey::namespaced(self.categories.namespace.clone(), self.categories.name.clone())
    }

    pub fn controller_options(&self) -> Result<ControllerOptions> {
        Ok(ControllerOptions {
            workers: self.controller.workers,
            watch_interval: self.watch_interval()?,
        })
    }
}
