//! mpdx-sync - diagnostics for the MPDX local sync store
//!
//! Shows sync timestamps, lists records waiting to be pushed, and wipes the
//! local cache.

mod cli;
mod commands;
mod error;

use clap::Parser;
use mpdx_core::config::{resolve_db_path, SyncSettings};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::common::default_db_path;
use crate::commands::dirty::run_dirty;
use crate::commands::status::run_status;
use crate::commands::wipe::run_wipe;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mpdx=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = SyncSettings::load(cli.config.as_deref())?;
    let db_path = resolve_db_path(cli.db_path, default_db_path);
    tracing::debug!("Using local store at {}", db_path.display());

    match cli.command {
        Commands::Status {
            key,
            stale_secs,
            json,
        } => {
            let stale_secs = stale_secs.unwrap_or(settings.pledges_stale_secs);
            run_status(&key, stale_secs, json, &db_path).await?;
        }
        Commands::Dirty { json } => run_dirty(json, &db_path).await?,
        Commands::Wipe => run_wipe(&db_path).await?,
    }

    Ok(())
}
