// src/cli/mod.rs
//! CLI definitions for the marketplace controller
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.
//!
//! - `init` / `run` / `sync` - database setup and the controllers
//! - `source` - chart repository registration
//! - `app` - the synchronized catalog
//! - `categories` - the category overlay
//! - `secret` / `release` - Helm release records

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod app;
mod categories;
mod release;
mod source;

pub use app::AppCommands;
pub use categories::CategoriesCommands;
pub use release::{ReleaseCommands, SecretCommands};
pub use source::{SourceCommands, SourceOptions};

#[derive(Parser)]
#[command(name = "marketplace")]
#[command(version)]
#[command(about = "Keeps an application catalog in sync with Helm chart repositories", long_about = None)]
pub struct Cli {
    /// Path to the configuration file [default: /etc/marketplace/config.toml]
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the database file (overrides the configuration file)
    #[arg(short, long, global = true)]
    pub db_path: Option<PathBuf>,

    /// Default log filter when RUST_LOG is unset (e.g., "debug", "marketplace=trace")
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log output format: text or json
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the database
    Init,

    /// Run the source and release controllers
    Run {
        /// Drain the work that is ready now and exit
        #[arg(long)]
        once: bool,

        /// Number of worker threads (overrides the configuration file)
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Synchronize one source now and print its status
    Sync {
        /// Source name
        name: String,
    },

    /// Chart repository sources
    #[command(subcommand)]
    Source(SourceCommands),

    /// Synchronized applications
    #[command(subcommand)]
    App(AppCommands),

    /// Category overlay
    #[command(subcommand)]
    Categories(CategoriesCommands),

    /// Helm release storage secrets
    #[command(subcommand)]
    Secret(SecretCommands),

    /// Decoded Helm releases
    #[command(subcommand)]
    Release(ReleaseCommands),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "marketplace",
            "source",
            "list",
            "--db-path",
            "/tmp/m.db",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.db_path, Some(PathBuf::from("/tmp/m.db")));
        assert_eq!(cli.log_format.as_deref(), Some("json"));
        assert!(matches!(cli.command, Commands::Source(SourceCommands::List)));
    }

    #[test]
    fn test_run_flags() {
        let cli = Cli::try_parse_from(["marketplace", "run", "--once", "-w", "4"]).unwrap();
        match cli.command {
            Commands::Run { once, workers } => {
                assert!(once);
                assert_eq!(workers, Some(4));
            }
            _ => panic!("expected run"),
        }
    }
}
