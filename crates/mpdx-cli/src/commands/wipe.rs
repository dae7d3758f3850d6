use std::path::Path;

use crate::commands::common::open_store;
use crate::error::CliError;

pub async fn run_wipe(db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    store.wipe().await?;
    println!("Local cache wiped: {}", db_path.display());
    Ok(())
}
