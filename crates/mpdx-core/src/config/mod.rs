//! Sync configuration.
//!
//! Staleness windows and paging limits used by the sync services. Every field
//! has a default, so an empty JSON object (or no file at all) is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::util::normalize_text_option;
use crate::{Error, Result};

/// Environment variable naming an optional JSON settings file.
pub const CONFIG_PATH_ENV: &str = "MPDX_SYNC_CONFIG";
/// Environment variable overriding the local database path.
pub const DB_PATH_ENV: &str = "MPDX_DB_PATH";

const DAY_SECS: u64 = 24 * 60 * 60;
const DEFAULT_PAGE_SIZE: u32 = 100;

/// Tunables for the sync services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSettings {
    /// How long fetched pledges stay fresh
    pub pledges_stale_secs: u64,
    /// Records requested per page
    pub page_size: u32,
    /// Upper bound on pages fetched per sync (0 fetches every page)
    pub max_pages: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            pledges_stale_secs: DAY_SECS,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: 0,
        }
    }
}

impl SyncSettings {
    /// Parse and validate settings from a JSON payload.
    pub fn from_json(payload: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(payload)
            .map_err(|error| Error::Config(format!("invalid sync settings JSON: {error}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from `path`, or from [`CONFIG_PATH_ENV`], or defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(|| {
            normalize_text_option(std::env::var(CONFIG_PATH_ENV).ok()).map(PathBuf::from)
        });
        let Some(path) = path else {
            return Ok(Self::default());
        };

        tracing::debug!("Loading sync settings from {}", path.display());
        let payload = std::fs::read_to_string(&path)?;
        Self::from_json(&payload)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::Config("page_size must be greater than 0".to_string()));
        }
        Ok(())
    }

    pub const fn pledges_stale_duration(&self) -> Duration {
        Duration::from_secs(self.pledges_stale_secs)
    }

    /// Page limit for `fetch_pages`; `None` fetches every page.
    pub const fn page_limit(&self) -> Option<u32> {
        if self.max_pages == 0 {
            None
        } else {
            Some(self.max_pages)
        }
    }
}

/// Resolve the database path: explicit, then [`DB_PATH_ENV`], then `default`.
pub fn resolve_db_path(explicit: Option<PathBuf>, default: impl FnOnce() -> PathBuf) -> PathBuf {
    explicit
        .or_else(|| normalize_text_option(std::env::var(DB_PATH_ENV).ok()).map(PathBuf::from))
        .unwrap_or_else(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn empty_object_yields_defaults() {
        let settings = SyncSettings::from_json("{}").unwrap();
        assert_eq!(settings, SyncSettings::default());
        assert_eq!(settings.pledges_stale_duration(), Duration::from_secs(DAY_SECS));
        assert_eq!(settings.page_limit(), None);
    }

    #[test]
    fn rejects_unknown_fields() {
        let error = SyncSettings::from_json(r#"{"page_sise": 10}"#).unwrap_err();
        assert!(error.to_string().contains("unknown field"));
    }

    #[test]
    fn rejects_zero_page_size() {
        let error = SyncSettings::from_json(r#"{"page_size": 0}"#).unwrap_err();
        assert!(matches!(error, Error::Config(_)));
    }

    #[test]
    fn load_reads_explicit_file() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("sync.json");
        std::fs::write(&path, r#"{"pledges_stale_secs": 60, "max_pages": 3}"#).unwrap();

        let settings = SyncSettings::load(Some(&path)).unwrap();
        assert_eq!(settings.pledges_stale_secs, 60);
        assert_eq!(settings.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(settings.page_limit(), Some(3));
    }

    #[test]
    fn explicit_db_path_wins() {
        let path = resolve_db_path(Some(PathBuf::from("/tmp/explicit.db")), || {
            PathBuf::from("/tmp/default.db")
        });
        assert_eq!(path, PathBuf::from("/tmp/explicit.db"));
    }
}
