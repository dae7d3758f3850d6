//! Contact model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ChangeAware, ChangeState, Entity};
use crate::util::{new_local_id, same_text};

/// A donor or prospect in an account list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    id: String,
    #[serde(default)]
    account_list_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    updated_in_db_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    state: ChangeState,
}

impl Contact {
    pub const FIELD_NAME: &'static str = "name";
    pub const FIELD_EMAIL: &'static str = "email";
    pub const FIELD_STATUS: &'static str = "status";
    pub const FIELD_NOTES: &'static str = "notes";

    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            account_list_id: None,
            name: None,
            email: None,
            status: None,
            notes: None,
            updated_in_db_at: None,
            state: ChangeState::default(),
        }
    }

    #[must_use]
    pub fn new_local(account_list_id: impl Into<String>) -> Self {
        Self {
            account_list_id: Some(account_list_id.into()),
            state: ChangeState::new_local(),
            ..Self::with_id(new_local_id())
        }
    }

    #[must_use]
    pub fn in_account_list(mut self, account_list_id: impl Into<String>) -> Self {
        self.account_list_id = Some(account_list_id.into());
        self
    }

    pub fn account_list_id(&self) -> Option<&str> {
        self.account_list_id.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: Option<String>) {
        if !same_text(self.name.as_deref(), name.as_deref()) {
            self.mark_changed(Self::FIELD_NAME);
        }
        self.name = name;
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn set_email(&mut self, email: Option<String>) {
        if !same_text(self.email.as_deref(), email.as_deref()) {
            self.mark_changed(Self::FIELD_EMAIL);
        }
        self.email = email;
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn set_status(&mut self, status: Option<String>) {
        if !same_text(self.status.as_deref(), status.as_deref()) {
            self.mark_changed(Self::FIELD_STATUS);
        }
        self.status = status;
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn set_notes(&mut self, notes: Option<String>) {
        if !same_text(self.notes.as_deref(), notes.as_deref()) {
            self.mark_changed(Self::FIELD_NOTES);
        }
        self.notes = notes;
    }
}

impl ChangeAware for Contact {
    fn change_state(&self) -> &ChangeState {
        &self.state
    }

    fn change_state_mut(&mut self) -> &mut ChangeState {
        &mut self.state
    }

    fn merge_changed_field(&mut self, source: &Self, field: &str) {
        match field {
            Self::FIELD_NAME => self.set_name(source.name.clone()),
            Self::FIELD_EMAIL => self.set_email(source.email.clone()),
            Self::FIELD_STATUS => self.set_status(source.status.clone()),
            Self::FIELD_NOTES => self.set_notes(source.notes.clone()),
            _ => {}
        }
    }

    fn does_field_match(&self, original: &Self, field: &str) -> bool {
        match field {
            Self::FIELD_NAME => same_text(self.name(), original.name()),
            Self::FIELD_EMAIL => same_text(self.email(), original.email()),
            _ => false,
        }
    }
}

impl Entity for Contact {
    const ENTITY_TYPE: &'static str = "contacts";

    fn id(&self) -> &str {
        &self.id
    }

    fn scope_id(&self) -> Option<&str> {
        self.account_list_id.as_deref()
    }
}
