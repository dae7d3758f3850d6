//! Sync timestamp repository

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::LastSyncTime;

/// Trait for sync timestamp storage operations
pub trait LastSyncRepository {
    /// Load the record for `id`, or a never-synced record when absent
    fn get(&self, id: &str) -> Result<LastSyncTime>;

    /// Insert or replace a record
    fn save(&self, last_sync: &LastSyncTime) -> Result<()>;

    /// All records, ordered by key
    fn list(&self) -> Result<Vec<LastSyncTime>>;
}

/// `SQLite` implementation of `LastSyncRepository`
pub struct SqliteLastSyncRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteLastSyncRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse(row: &rusqlite::Row<'_>) -> rusqlite::Result<LastSyncTime> {
        Ok(LastSyncTime {
            id: row.get(0)?,
            last_sync: row
                .get::<_, Option<i64>>(1)?
                .and_then(DateTime::<Utc>::from_timestamp_millis),
            last_full_sync: row
                .get::<_, Option<i64>>(2)?
                .and_then(DateTime::<Utc>::from_timestamp_millis),
        })
    }
}

impl LastSyncRepository for SqliteLastSyncRepository<'_> {
    fn get(&self, id: &str) -> Result<LastSyncTime> {
        let stored = self
            .conn
            .query_row(
                "SELECT id, last_sync, last_full_sync FROM last_sync_times WHERE id = ?",
                params![id],
                Self::parse,
            )
            .optional()?;
        Ok(stored.unwrap_or_else(|| LastSyncTime::new(id)))
    }

    fn save(&self, last_sync: &LastSyncTime) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO last_sync_times (id, last_sync, last_full_sync)
             VALUES (?, ?, ?)",
            params![
                last_sync.id,
                last_sync.last_sync().map(|at| at.timestamp_millis()),
                last_sync.last_full_sync().map(|at| at.timestamp_millis()),
            ],
        )?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<LastSyncTime>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, last_sync, last_full_sync FROM last_sync_times ORDER BY id")?;
        let rows = stmt
            .query_map([], Self::parse)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
