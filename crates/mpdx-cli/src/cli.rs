use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mpdx-sync")]
#[command(about = "Inspect the local MPDX sync store")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional JSON file with sync settings
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show when a sync key last ran and whether a sync is due
    Status {
        /// Sync key parts, e.g. `pledges <appeal id>`
        #[arg(required = true, value_name = "PART")]
        key: Vec<String>,
        /// Staleness window in seconds (defaults to the pledges window)
        #[arg(long, value_name = "SECS")]
        stale_secs: Option<u64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List pledges waiting to be pushed
    Dirty {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete every cached record and sync timestamp
    Wipe,
}
