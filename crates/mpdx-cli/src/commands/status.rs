use std::path::Path;
use std::time::Duration;

use mpdx_core::models::LastSyncTime;
use mpdx_core::util::normalize_text_option;
use serde::Serialize;

use crate::commands::common::{format_timestamp, open_store};
use crate::error::CliError;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SyncStatusItem {
    pub key: String,
    pub last_sync: Option<String>,
    pub last_full_sync: Option<String>,
    pub stale_secs: u64,
    pub needs_sync: bool,
    pub needs_full_sync: bool,
}

/// Join trimmed key parts into a sync key.
pub fn sync_key(parts: &[String]) -> Result<String, CliError> {
    let parts = parts
        .iter()
        .map(|part| normalize_text_option(Some(part.clone())).ok_or(CliError::EmptyKeyPart))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(LastSyncTime::key(&parts))
}

pub fn sync_status_item(last_sync: &LastSyncTime, stale_secs: u64) -> SyncStatusItem {
    let stale = Duration::from_secs(stale_secs);
    SyncStatusItem {
        key: last_sync.id.clone(),
        last_sync: last_sync.last_sync().map(|at| at.to_rfc3339()),
        last_full_sync: last_sync.last_full_sync().map(|at| at.to_rfc3339()),
        stale_secs,
        needs_sync: last_sync.needs_sync(stale, false),
        needs_full_sync: last_sync.needs_full_sync(stale, false),
    }
}

pub async fn run_status(
    parts: &[String],
    stale_secs: u64,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let key = sync_key(parts)?;
    let store = open_store(db_path)?;
    let last_sync = store.last_sync_time(&key).await?;
    let status = sync_status_item(&last_sync, stale_secs);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("key:            {}", status.key);
    println!("last sync:      {}", format_timestamp(last_sync.last_sync()));
    println!(
        "last full sync: {}",
        format_timestamp(last_sync.last_full_sync())
    );
    println!("sync due:       {}", yes_no(status.needs_sync));
    println!("full sync due:  {}", yes_no(status.needs_full_sync));
    Ok(())
}

const fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
