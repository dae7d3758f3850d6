//! Sync coordination: staleness checks, per-key locks, task tracking, and the
//! pledges sync service built on top of them.

mod api;
mod coordinator;
mod mutex_map;
mod pledges;
mod task;
mod tracker;

use thiserror::Error;

pub use api::{fetch_pages, ApiError, Page, PartialUpdate, PledgeApi};
pub use coordinator::{DirtySyncCoordinator, SyncOutcome, SyncRequest};
pub use mutex_map::MutexMap;
pub use pledges::{DirtySyncReport, PledgesSyncService, SYNC_PLEDGES};
pub use task::SyncTask;
pub use tracker::SyncTracker;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Store error during sync: {0}")]
    Store(#[from] crate::Error),
    #[error("Remote API error: {0}")]
    Api(#[from] ApiError),
}

pub type SyncResult<T> = Result<T, SyncError>;
