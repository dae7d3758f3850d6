//! Phone number model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ChangeAware, ChangeState, Entity};
use crate::util::{new_local_id, same_text};

/// A phone number attached to a person on a contact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumber {
    id: String,
    #[serde(default)]
    person_id: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    number: Option<String>,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    historic: bool,
    #[serde(default)]
    updated_in_db_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    state: ChangeState,
}

impl PhoneNumber {
    pub const FIELD_LOCATION: &'static str = "location";
    pub const FIELD_NUMBER: &'static str = "number";
    pub const FIELD_PRIMARY: &'static str = "primary";

    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            person_id: None,
            location: None,
            number: None,
            primary: false,
            historic: false,
            updated_in_db_at: None,
            state: ChangeState::default(),
        }
    }

    #[must_use]
    pub fn new_local(person_id: impl Into<String>) -> Self {
        Self {
            person_id: Some(person_id.into()),
            state: ChangeState::new_local(),
            ..Self::with_id(new_local_id())
        }
    }

    pub fn person_id(&self) -> Option<&str> {
        self.person_id.as_deref()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn set_location(&mut self, location: Option<String>) {
        if !same_text(self.location.as_deref(), location.as_deref()) {
            self.mark_changed(Self::FIELD_LOCATION);
        }
        self.location = location;
    }

    pub fn number(&self) -> Option<&str> {
        self.number.as_deref()
    }

    pub fn set_number(&mut self, number: Option<String>) {
        if !same_text(self.number.as_deref(), number.as_deref()) {
            self.mark_changed(Self::FIELD_NUMBER);
        }
        self.number = number;
    }

    pub const fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn set_primary(&mut self, primary: bool) {
        if self.primary != primary {
            self.mark_changed(Self::FIELD_PRIMARY);
        }
        self.primary = primary;
    }

    /// Numbers marked historic are hidden but never synced back.
    pub const fn is_historic(&self) -> bool {
        self.historic
    }
}

impl ChangeAware for PhoneNumber {
    fn change_state(&self) -> &ChangeState {
        &self.state
    }

    fn change_state_mut(&mut self) -> &mut ChangeState {
        &mut self.state
    }

    fn merge_changed_field(&mut self, source: &Self, field: &str) {
        match field {
            Self::FIELD_LOCATION => self.set_location(source.location.clone()),
            Self::FIELD_NUMBER => self.set_number(source.number.clone()),
            Self::FIELD_PRIMARY => self.set_primary(source.primary),
            _ => {}
        }
    }

    fn does_field_match(&self, original: &Self, field: &str) -> bool {
        match field {
            Self::FIELD_NUMBER => self.number == original.number,
            _ => false,
        }
    }
}

impl Entity for PhoneNumber {
    const ENTITY_TYPE: &'static str = "phone_numbers";

    fn id(&self) -> &str {
        &self.id
    }

    fn scope_id(&self) -> Option<&str> {
        self.person_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untracked_edits_are_not_recorded() {
        let mut phone = PhoneNumber::with_id("ph1");
        phone.set_number(Some("555-0100".to_string()));
        phone.set_primary(true);
        assert!(!phone.has_changed_fields());
    }

    #[test]
    fn only_number_is_cleared_by_echo() {
        let mut pushed = PhoneNumber::with_id("ph1");
        pushed.set_tracking_changes(true);
        pushed.set_number(Some("555-0100".to_string()));
        pushed.set_location(Some("mobile".to_string()));

        let mut stored = pushed.clone();
        stored.clear_changed_fields_matching(&pushed);
        assert!(stored.changed_fields().contains(PhoneNumber::FIELD_LOCATION));
        assert!(!stored.changed_fields().contains(PhoneNumber::FIELD_NUMBER));
    }

    #[test]
    fn number_mismatch_stays_dirty() {
        let mut pushed = PhoneNumber::with_id("ph1");
        pushed.set_tracking_changes(true);
        pushed.set_number(Some("555-0100".to_string()));

        let mut stored = pushed.clone();
        stored.set_tracking_changes(false);
        stored.set_number(Some("555-0199".to_string()));
        stored.clear_changed_fields_matching(&pushed);
        assert!(stored.changed_fields().contains(PhoneNumber::FIELD_NUMBER));
    }
}
