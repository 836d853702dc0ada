// src/cli/release.rs
//! Release and release-secret commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum SecretCommands {
    /// Store a secret from a JSON document as printed by `kubectl get secret -o json`
    Import {
        /// Path to the JSON document
        file: String,
    },
}

#[derive(Subcommand)]
pub enum ReleaseCommands {
    /// List releases
    List {
        /// Only releases in this namespace
        #[arg(short, long)]
        namespace: Option<String>,
    },

    /// Show one release
    Show {
        /// Release name
        name: String,

        /// Release namespace
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },

    /// Decode a release payload or a release secret JSON document
    Decode {
        /// Path to the payload or secret
        file: String,
    },
}
