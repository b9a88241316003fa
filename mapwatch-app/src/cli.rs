use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Watch game servers and get told when a favourite map is running.
#[derive(Debug, Parser)]
#[command(name = "mapwatch", version, about)]
pub struct Cli {
    /// Configuration file (YAML). Without it `mapwatch.yaml` is used if present.
    #[arg(short, long, env = "MAPWATCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll the servers until interrupted.
    Watch,
    /// Refresh once and print what every server is running.
    Check {
        #[arg(long)]
        json: bool,
    },
    /// Extract map name, image URL and player count from an HTML file (or stdin).
    Extract {
        file: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Manage watched map names.
    Maps {
        #[command(subcommand)]
        action: ListAction,
    },
    /// Manage polled server pages.
    Servers {
        #[command(subcommand)]
        action: ListAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum ListAction {
    List,
    Add { value: String },
    /// Remove the entry at INDEX as shown by `list`.
    Remove { index: usize },
}
