use std::path::Path;

use mpdx_core::models::Pledge;

use crate::commands::common::{
    dirty_pledge_item, format_dirty_lines, open_store, DirtyPledgeItem,
};
use crate::error::CliError;

pub async fn run_dirty(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let pledges = store.list_dirty::<Pledge>().await?;

    if as_json {
        let json_items = pledges
            .iter()
            .map(dirty_pledge_item)
            .collect::<Vec<DirtyPledgeItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if pledges.is_empty() {
        println!("No pledges waiting to sync.");
        return Ok(());
    }

    for line in format_dirty_lines(&pledges) {
        println!("{line}");
    }
    Ok(())
}
