//! Local store for synced records

mod connection;
mod entity_repository;
mod last_sync_repository;
mod migrations;

pub use connection::Database;
pub use entity_repository::{EntityRepository, ExistingItems, SqliteEntityRepository};
pub use last_sync_repository::{LastSyncRepository, SqliteLastSyncRepository};
