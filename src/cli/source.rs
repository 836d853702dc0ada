// src/cli/source.rs
//! Source management commands

use clap::{Args, Subcommand};

/// Credentials and schedule shared by `add` and `edit`
#[derive(Args, Debug, Default)]
pub struct SourceOptions {
    /// Basic auth user name
    #[arg(long)]
    pub username: Option<String>,

    /// Basic auth password
    #[arg(long)]
    pub password: Option<String>,

    /// PEM client certificate file (requires --key-file)
    #[arg(long)]
    pub cert_file: Option<String>,

    /// PEM client key file (requires --cert-file)
    #[arg(long)]
    pub key_file: Option<String>,

    /// PEM CA bundle used to verify the repository
    #[arg(long)]
    pub ca_file: Option<String>,

    /// Time to wait after a sync before running again (e.g., "10m", "1h")
    #[arg(long)]
    pub update_frequency: Option<String>,
}

#[derive(Subcommand)]
pub enum SourceCommands {
    /// Register a chart repository
    Add {
        /// Source name; applications are named `<source>.<package>`
        name: String,

        /// Repository URL (the index is read from `<url>/index.yaml`)
        url: String,

        #[command(flatten)]
        options: SourceOptions,

        /// Register without ever synchronizing
        #[arg(long)]
        skip_sync: bool,
    },

    /// List sources and their sync state
    List,

    /// Show one source
    Show {
        /// Source name
        name: String,
    },

    /// Change a source; any change triggers a new sync
    Edit {
        /// Source name
        name: String,

        /// New repository URL
        #[arg(long)]
        url: Option<String>,

        #[command(flatten)]
        options: SourceOptions,

        /// Enable or disable synchronization
        #[arg(long)]
        skip_sync: Option<bool>,
    },

    /// Remove a source and every application it controls
    Remove {
        /// Source name
        name: String,
    },
}
