//! Staleness checks and per-key serialization for sync attempts

use std::future::Future;
use std::time::Duration;

use super::{MutexMap, SyncError, SyncResult};
use crate::models::LastSyncTime;
use crate::services::StoreService;
use crate::Result;

/// A sync attempt as handed to [`DirtySyncCoordinator::run_sync`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    pub key: String,
    pub stale: Duration,
    pub forced: bool,
    pub full: bool,
}

impl SyncRequest {
    /// A full sync of `key` that is due once `stale` has elapsed.
    pub fn full(key: impl Into<String>, stale: Duration) -> Self {
        Self {
            key: key.into(),
            stale,
            forced: false,
            full: true,
        }
    }

    /// An incremental sync of `key`.
    pub fn partial(key: impl Into<String>, stale: Duration) -> Self {
        Self {
            full: false,
            ..Self::full(key, stale)
        }
    }

    #[must_use]
    pub const fn forced(mut self, forced: bool) -> Self {
        self.forced = forced;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The key was synced recently enough
    Skipped,
    Synced,
    /// The body failed; the attempt was still recorded
    Failed,
}

/// Decides whether a sync is due and makes sure only one sync per key runs at
/// a time.
#[derive(Clone)]
pub struct DirtySyncCoordinator {
    store: StoreService,
    locks: MutexMap<String>,
}

impl DirtySyncCoordinator {
    pub fn new(store: StoreService) -> Self {
        Self {
            store,
            locks: MutexMap::new(),
        }
    }

    pub const fn store(&self) -> &StoreService {
        &self.store
    }

    pub async fn needs_sync(&self, key: &str, stale: Duration, forced: bool) -> Result<bool> {
        if forced {
            return Ok(true);
        }
        let last_sync = self.store.last_sync_time(key).await?;
        Ok(last_sync.needs_sync(stale, false))
    }

    /// Run `f` while holding the lock for `key`. Callers queue in arrival
    /// order.
    pub async fn with_lock<F, Fut, T>(&self, key: &str, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.locks.with_lock(key.to_string(), f).await
    }

    /// Record an attempt for `key`. A full sync also advances
    /// `last_full_sync`.
    pub async fn track_sync(&self, key: &str, full: bool) -> Result<LastSyncTime> {
        let mut last_sync = self.store.last_sync_time(key).await?;
        last_sync.track_sync(full);
        self.store.save_last_sync_time(&last_sync).await?;
        Ok(last_sync)
    }

    /// Lock the key, re-check staleness inside the lock, run `body`, and
    /// record the attempt before releasing the lock.
    ///
    /// A failing body is recorded as a partial sync so the next attempt waits
    /// out the staleness window. API failures are logged and reported as
    /// [`SyncOutcome::Failed`]; store failures, from the body or from the
    /// bookkeeping, are returned. If the returned future is dropped while the
    /// body runs, nothing is recorded.
    pub async fn run_sync<F, Fut>(&self, request: SyncRequest, body: F) -> SyncResult<SyncOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SyncResult<()>>,
    {
        let SyncRequest {
            key,
            stale,
            forced,
            full,
        } = request;
        let key = key.as_str();
        self.with_lock(key, || async move {
            if !self.needs_sync(key, stale, forced).await? {
                tracing::debug!(key, "Sync skipped, last sync is still fresh");
                return Ok(SyncOutcome::Skipped);
            }

            match body().await {
                Ok(()) => {
                    self.track_sync(key, full).await?;
                    tracing::info!(key, full, "Sync completed");
                    Ok(SyncOutcome::Synced)
                }
                Err(SyncError::Api(error)) => {
                    tracing::warn!(key, %error, "Sync failed");
                    self.track_sync(key, false).await?;
                    Ok(SyncOutcome::Failed)
                }
                Err(error) => {
                    tracing::error!(key, %error, "Sync aborted by store error");
                    self.track_sync(key, false).await?;
                    Err(error)
                }
            }
        })
        .await
    }
}
