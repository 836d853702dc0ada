// src/cli/app.rs
//! Application catalog commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum AppCommands {
    /// List applications
    List {
        /// Only applications from this source
        #[arg(short, long)]
        source: Option<String>,

        /// Only applications in this category
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Show an application and every recorded version
    Show {
        /// Application name (`<source>.<package>`)
        name: String,
    },
}
