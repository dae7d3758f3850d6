//! Persisted synced record

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::ChangeAware;

/// Serialized name of the server-side modification stamp sent with every
/// partial update.
pub const FIELD_UPDATED_IN_DB_AT: &str = "updated_in_db_at";

/// A change-aware record that lives in the local store.
///
/// Attributes are stored as a JSON payload; the [`ChangeState`] is kept in
/// dedicated columns so dirty queries don't need to decode payloads. The
/// serialized attribute names double as the field names used for change
/// tracking.
///
/// [`ChangeState`]: super::ChangeState
pub trait Entity: ChangeAware + Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Stable type tag stored alongside each record
    const ENTITY_TYPE: &'static str;

    fn id(&self) -> &str;

    /// Parent record this entity is listed under (account list, appeal, person).
    fn scope_id(&self) -> Option<&str> {
        None
    }
}
