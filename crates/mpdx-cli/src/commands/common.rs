use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use mpdx_core::models::{Entity, Pledge};
use mpdx_core::services::StoreService;
use mpdx_core::ChangeAware;
use serde::Serialize;

use crate::error::CliError;

#[derive(Debug, Serialize, PartialEq)]
pub struct DirtyPledgeItem {
    pub id: String,
    pub account_list_id: Option<String>,
    pub appeal_id: Option<String>,
    pub amount: Option<f64>,
    pub pending: &'static str,
    pub changed_fields: Vec<String>,
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mpdx")
        .join("mpdx.db")
}

pub fn open_store(db_path: &Path) -> Result<StoreService, CliError> {
    Ok(StoreService::open_path(db_path)?)
}

pub fn format_timestamp(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp.map_or_else(
        || "never".to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

/// Which push a dirty pledge is waiting for.
pub fn pending_action(pledge: &Pledge) -> &'static str {
    if pledge.is_deleted() {
        "delete"
    } else if pledge.is_new() {
        "create"
    } else {
        "update"
    }
}

pub fn dirty_pledge_item(pledge: &Pledge) -> DirtyPledgeItem {
    DirtyPledgeItem {
        id: pledge.id().to_string(),
        account_list_id: pledge.account_list_id().map(str::to_string),
        appeal_id: pledge.appeal_id().map(str::to_string),
        amount: pledge.amount(),
        pending: pending_action(pledge),
        changed_fields: pledge.changed_fields().iter().map(str::to_string).collect(),
    }
}

pub fn format_dirty_lines(pledges: &[Pledge]) -> Vec<String> {
    pledges
        .iter()
        .map(|pledge| {
            let fields = pledge.changed_fields();
            let appeal = pledge.appeal_id().unwrap_or("-");
            if fields.is_empty() {
                format!("{}  {:<6}  appeal {appeal}", pledge.id(), pending_action(pledge))
            } else {
                format!(
                    "{}  {:<6}  appeal {appeal}  [{fields}]",
                    pledge.id(),
                    pending_action(pledge)
                )
            }
        })
        .collect()
}
