//! mpdx-core - Core library for MPDX sync
//!
//! This crate contains the change-tracking models, the local store, and the
//! sync coordination used by every MPDX client (mobile, CLI).

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{ChangeAware, ChangeState, ChangedFieldSet, LastSyncTime};
