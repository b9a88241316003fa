use anyhow::{Context, Result};
use clap::Parser;
use mapwatch_common::observability::init_logging;
use mapwatch_config::{MapwatchConfig, MapwatchConfigLoader};

use cli::{Cli, Command};

mod cli;
mod commands;

const DEFAULT_CONFIG_FILE: &str = "mapwatch.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // An explicit --config must exist; the default file is optional. Env wins either way.
    let loader = match &cli.config {
        Some(path) => MapwatchConfigLoader::new().with_file(path),
        None => MapwatchConfigLoader::new().with_optional_file(DEFAULT_CONFIG_FILE),
    };
    let cfg: MapwatchConfig = loader.load().context("loading configuration")?;

    let log_path = init_logging(cfg.log_config("mapwatch"))?;
    tracing::debug!(log = %log_path.display(), "mapwatch.start");

    match cli.command {
        Command::Watch => commands::watch(&cfg).await,
        Command::Check { json } => commands::check(&cfg, json).await,
        Command::Extract { file, json } => commands::extract(&cfg, file.as_deref(), json),
        Command::Maps { action } => commands::edit_maps(&cfg, action),
        Command::Servers { action } => commands::edit_servers(&cfg, action),
    }
}
