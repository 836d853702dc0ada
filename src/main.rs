// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{
    AppCommands, CategoriesCommands, Cli, Commands, ReleaseCommands, SecretCommands,
    SourceCommands,
};
use marketplace::config::DEFAULT_CONFIG_PATH;
use marketplace::{ControllerConfig, LogFormat};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Configuration file with command-line overrides applied
fn load_config(cli: &Cli) -> Result<ControllerConfig> {
    let mut config = match &cli.config {
        Some(path) => ControllerConfig::load(path)?,
        None => ControllerConfig::load_or_default(Path::new(DEFAULT_CONFIG_PATH))?,
    };

    if let Some(db_path) = &cli.db_path {
        config.database = db_path.clone();
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.logging.format = format.parse()?;
    }
    Ok(config)
}

fn init_logging(config: &ControllerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match config.logging.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(&config);

    let db_path: PathBuf = config.database.clone();
    let db = db_path.as_path();

    match cli.command {
        Commands::Init => commands::cmd_init(db),
        Commands::Run { once, workers } => commands::cmd_run(db, &config, once, workers),
        Commands::Sync { name } => commands::cmd_sync(db, &config, &name),

        Commands::Source(cmd) => match cmd {
            SourceCommands::Add {
                name,
                url,
                options,
                skip_sync,
            } => commands::cmd_source_add(db, &name, &url, options, skip_sync),
            SourceCommands::List => commands::cmd_source_list(db),
            SourceCommands::Show { name } => commands::cmd_source_show(db, &name),
            SourceCommands::Edit {
                name,
                url,
                options,
                skip_sync,
            } => commands::cmd_source_edit(db, &name, url, options, skip_sync),
            SourceCommands::Remove { name } => commands::cmd_source_remove(db, &name),
        },

        Commands::App(cmd) => match cmd {
            AppCommands::List { source, category } => {
                commands::cmd_app_list(db, source.as_deref(), category.as_deref())
            }
            AppCommands::Show { name } => commands::cmd_app_show(db, &name),
        },

        Commands::Categories(cmd) => match cmd {
            CategoriesCommands::Import { file } => {
                commands::cmd_categories_import(db, &config.categories_key(), &file)
            }
            CategoriesCommands::Show => commands::cmd_categories_show(db, &config.categories_key()),
        },

        Commands::Secret(cmd) => match cmd {
            SecretCommands::Import { file } => commands::cmd_secret_import(db, &file),
        },

        Commands::Release(cmd) => match cmd {
            ReleaseCommands::List { namespace } => commands::cmd_release_list(db, namespace.as_deref()),
            ReleaseCommands::Show { name, namespace } => {
                commands::cmd_release_show(db, &namespace, &name)
            }
            ReleaseCommands::Decode { file } => commands::cmd_release_decode(&file),
        },
    }
}
