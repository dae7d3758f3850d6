//! Shared store service wrapper used across clients.

use std::path::PathBuf;
use std::sync::Arc;

use rusqlite::Transaction;
use tokio::sync::Mutex;

use crate::db::{
    Database, EntityRepository, LastSyncRepository, SqliteEntityRepository,
    SqliteLastSyncRepository,
};
use crate::models::{Entity, LastSyncTime};
use crate::Result;

/// Thread-safe handle to the local store.
///
/// Every write goes through [`Database::transaction`], so each call either
/// commits entirely or leaves the store untouched.
#[derive(Clone)]
pub struct StoreService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl StoreService {
    /// Open a store at the given filesystem path.
    pub fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path)?;
        tracing::debug!("Opened local store at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    pub fn db_path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    /// Run `f` in a single transaction.
    pub async fn transaction<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut db = self.db.lock().await;
        db.transaction(f)
    }

    /// Fetch a record by id, including soft-deleted records.
    pub async fn get<T: Entity>(&self, id: &str) -> Result<Option<T>> {
        let db = self.db.lock().await;
        SqliteEntityRepository::new(db.connection()).get(id)
    }

    /// List records, optionally including soft-deleted ones.
    pub async fn list<T: Entity>(&self, include_deleted: bool) -> Result<Vec<T>> {
        let db = self.db.lock().await;
        SqliteEntityRepository::new(db.connection()).list(include_deleted)
    }

    /// List records listed under a parent record.
    pub async fn list_for_scope<T: Entity>(
        &self,
        scope_id: &str,
        include_deleted: bool,
    ) -> Result<Vec<T>> {
        let db = self.db.lock().await;
        SqliteEntityRepository::new(db.connection()).list_for_scope(scope_id, include_deleted)
    }

    /// List records awaiting a push.
    pub async fn list_dirty<T: Entity>(&self) -> Result<Vec<T>> {
        let db = self.db.lock().await;
        SqliteEntityRepository::new(db.connection()).list_dirty()
    }

    /// Save a locally edited record.
    pub async fn save<T: Entity>(&self, item: &T) -> Result<()> {
        self.transaction(|tx| SqliteEntityRepository::new(tx).save(item))
            .await
    }

    /// Soft-delete a record locally.
    pub async fn mark_deleted<T: Entity>(&self, id: &str) -> Result<()> {
        self.transaction(|tx| SqliteEntityRepository::new(tx).mark_deleted::<T>(id))
            .await
    }

    /// Remove a record from the local store for good.
    pub async fn delete<T: Entity>(&self, id: &str) -> Result<()> {
        self.transaction(|tx| SqliteEntityRepository::new(tx).delete::<T>(id))
            .await
    }

    /// Store a server page, merging local edits, optionally pruning
    /// records under `scope_id` the server no longer returns.
    pub async fn save_from_remote<T: Entity>(
        &self,
        items: Vec<T>,
        scope_id: Option<&str>,
        delete_orphans: bool,
    ) -> Result<bool> {
        self.transaction(|tx| {
            let repo = SqliteEntityRepository::new(tx);
            let existing = scope_id
                .map(|scope_id| repo.existing_for_scope::<T>(scope_id))
                .transpose()?;
            repo.save_from_remote(items, existing, delete_orphans)
        })
        .await
    }

    /// Load the sync timestamps for `key`.
    pub async fn last_sync_time(&self, key: &str) -> Result<LastSyncTime> {
        let db = self.db.lock().await;
        SqliteLastSyncRepository::new(db.connection()).get(key)
    }

    /// Persist sync timestamps.
    pub async fn save_last_sync_time(&self, last_sync: &LastSyncTime) -> Result<()> {
        self.transaction(|tx| SqliteLastSyncRepository::new(tx).save(last_sync))
            .await
    }

    /// All stored sync timestamps.
    pub async fn list_last_sync_times(&self) -> Result<Vec<LastSyncTime>> {
        let db = self.db.lock().await;
        SqliteLastSyncRepository::new(db.connection()).list()
    }

    /// Full local cache wipe.
    pub async fn wipe(&self) -> Result<()> {
        let mut db = self.db.lock().await;
        db.wipe()
    }
}
