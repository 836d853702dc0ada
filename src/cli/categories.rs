// src/cli/categories.rs
//! Category overlay commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum CategoriesCommands {
    /// Store a category document (YAML map of category -> packages)
    Import {
        /// Path to the YAML document
        file: String,
    },

    /// Show the package -> categories overlay currently in effect
    Show,
}
