//! Data models for MPDX sync

mod change_aware;
mod changed_fields;
mod contact;
mod entity;
mod last_sync_time;
mod phone_number;
mod pledge;

pub use change_aware::{ChangeAware, ChangeState};
pub use changed_fields::{ChangedFieldSet, FIELD_DELIMITER};
pub use contact::Contact;
pub use entity::{Entity, FIELD_UPDATED_IN_DB_AT};
pub use last_sync_time::{LastSyncTime, KEY_SEPARATOR};
pub use phone_number::PhoneNumber;
pub use pledge::{Pledge, PledgeStatus};
