//! Per-key sync timestamps

use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::time::Duration;

/// Separator between the parts of a composite sync key.
pub const KEY_SEPARATOR: &str = "|";

/// When a sync key was last attempted, and last fully synced.
///
/// `last_sync` advances on every attempt, successful or not, so a failing
/// remote cannot cause a retry storm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastSyncTime {
    /// Composite sync key, e.g. `pledges|<appeal id>`
    pub id: String,
    pub(crate) last_sync: Option<DateTime<Utc>>,
    pub(crate) last_full_sync: Option<DateTime<Utc>>,
}

impl LastSyncTime {
    /// A record that has never been synced.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            last_sync: None,
            last_full_sync: None,
        }
    }

    /// Build the composite key for `parts`.
    #[must_use]
    pub fn key<S: AsRef<str>>(parts: &[S]) -> String {
        parts
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(KEY_SEPARATOR)
    }

    pub const fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.last_sync
    }

    pub const fn last_full_sync(&self) -> Option<DateTime<Utc>> {
        self.last_full_sync
    }

    pub fn needs_sync(&self, stale: Duration, forced: bool) -> bool {
        self.needs_sync_at(stale, forced, Utc::now())
    }

    /// True if forced, never synced, or the last sync is older than `stale`.
    pub fn needs_sync_at(&self, stale: Duration, forced: bool, now: DateTime<Utc>) -> bool {
        forced || is_stale(self.last_sync, stale, now)
    }

    pub fn needs_full_sync(&self, stale: Duration, forced: bool) -> bool {
        self.needs_full_sync_at(stale, forced, Utc::now())
    }

    pub fn needs_full_sync_at(&self, stale: Duration, forced: bool, now: DateTime<Utc>) -> bool {
        forced || is_stale(self.last_full_sync, stale, now)
    }

    pub fn track_sync(&mut self, full_sync: bool) {
        self.track_sync_at(full_sync, Utc::now());
    }

    /// Record an attempt at `now`, truncated to the millisecond precision
    /// the store keeps.
    pub fn track_sync_at(&mut self, full_sync: bool, now: DateTime<Utc>) {
        let now = now.trunc_subsecs(3);
        self.last_sync = Some(now);
        if full_sync {
            self.last_full_sync = Some(now);
        }
    }

    /// Window of server modification times to request for an incremental sync.
    ///
    /// Starts `time_skew` before the last sync (or at `default_start` when
    /// never synced) and ends `time_skew` past now, to absorb clock drift.
    pub fn since_last_sync_range(
        &self,
        time_skew: Duration,
        default_start: DateTime<Utc>,
    ) -> RangeInclusive<DateTime<Utc>> {
        let skew = TimeDelta::from_std(time_skew).unwrap_or(TimeDelta::MAX);
        let start = self
            .last_sync
            .and_then(|last| last.checked_sub_signed(skew))
            .unwrap_or(default_start);
        let now = Utc::now();
        let end = now.checked_add_signed(skew).unwrap_or(now);
        start..=end
    }
}

fn is_stale(at: Option<DateTime<Utc>>, stale: Duration, now: DateTime<Utc>) -> bool {
    let Some(at) = at else {
        return true;
    };
    // Windows too large for chrono never expire.
    let Ok(stale) = TimeDelta::from_std(stale) else {
        return false;
    };
    now.signed_duration_since(at) > stale
}
