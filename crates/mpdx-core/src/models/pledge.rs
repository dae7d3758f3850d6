//! Pledge model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{ChangeAware, ChangeState, Entity};
use crate::util::new_local_id;

/// Fulfilment state of a pledge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PledgeStatus {
    NotReceived,
    ReceivedNotProcessed,
    Processed,
}

/// A commitment from a contact to give toward an appeal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pledge {
    id: String,
    #[serde(default)]
    account_list_id: Option<String>,
    #[serde(default)]
    appeal_id: Option<String>,
    #[serde(default)]
    contact_id: Option<String>,
    #[serde(default)]
    amount: Option<f64>,
    #[serde(default)]
    expected_date: Option<NaiveDate>,
    #[serde(default)]
    status: Option<PledgeStatus>,
    #[serde(default)]
    updated_in_db_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    state: ChangeState,
}

impl Pledge {
    pub const FIELD_AMOUNT: &'static str = "amount";
    pub const FIELD_APPEAL: &'static str = "appeal_id";
    pub const FIELD_EXPECTED_DATE: &'static str = "expected_date";
    pub const FIELD_STATUS: &'static str = "status";

    /// A pledge the server already knows about.
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            account_list_id: None,
            appeal_id: None,
            contact_id: None,
            amount: None,
            expected_date: None,
            status: None,
            updated_in_db_at: None,
            state: ChangeState::default(),
        }
    }

    /// A pledge created on this device, pending its first push.
    #[must_use]
    pub fn new_local(
        account_list_id: impl Into<String>,
        appeal_id: impl Into<String>,
        contact_id: impl Into<String>,
    ) -> Self {
        Self {
            account_list_id: Some(account_list_id.into()),
            appeal_id: Some(appeal_id.into()),
            contact_id: Some(contact_id.into()),
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

    pub fn appeal_id(&self) -> Option<&str> {
        self.appeal_id.as_deref()
    }

    pub fn set_appeal_id(&mut self, appeal_id: Option<String>) {
        if self.appeal_id != appeal_id {
            self.mark_changed(Self::FIELD_APPEAL);
        }
        self.appeal_id = appeal_id;
    }

    pub fn contact_id(&self) -> Option<&str> {
        self.contact_id.as_deref()
    }

    pub const fn amount(&self) -> Option<f64> {
        self.amount
    }

    #[allow(clippy::float_cmp)]
    pub fn set_amount(&mut self, amount: Option<f64>) {
        if self.amount != amount {
            self.mark_changed(Self::FIELD_AMOUNT);
        }
        self.amount = amount;
    }

    pub const fn expected_date(&self) -> Option<NaiveDate> {
        self.expected_date
    }

    pub fn set_expected_date(&mut self, expected_date: Option<NaiveDate>) {
        if self.expected_date != expected_date {
            self.mark_changed(Self::FIELD_EXPECTED_DATE);
        }
        self.expected_date = expected_date;
    }

    pub const fn status(&self) -> Option<PledgeStatus> {
        self.status
    }

    pub fn set_status(&mut self, status: Option<PledgeStatus>) {
        if self.status != status {
            self.mark_changed(Self::FIELD_STATUS);
        }
        self.status = status;
    }

    pub const fn updated_in_db_at(&self) -> Option<DateTime<Utc>> {
        self.updated_in_db_at
    }

    pub fn set_updated_in_db_at(&mut self, updated_in_db_at: Option<DateTime<Utc>>) {
        self.updated_in_db_at = updated_in_db_at;
    }
}

impl ChangeAware for Pledge {
    fn change_state(&self) -> &ChangeState {
        &self.state
    }

    fn change_state_mut(&mut self) -> &mut ChangeState {
        &mut self.state
    }

    fn merge_changed_field(&mut self, source: &Self, field: &str) {
        match field {
            Self::FIELD_AMOUNT => self.set_amount(source.amount),
            Self::FIELD_APPEAL => self.set_appeal_id(source.appeal_id.clone()),
            Self::FIELD_EXPECTED_DATE => self.set_expected_date(source.expected_date),
            Self::FIELD_STATUS => self.set_status(source.status),
            _ => {}
        }
    }

    #[allow(clippy::float_cmp)]
    fn does_field_match(&self, original: &Self, field: &str) -> bool {
        match field {
            Self::FIELD_AMOUNT => self.amount == original.amount,
            _ => false,
        }
    }
}

impl Entity for Pledge {
    const ENTITY_TYPE: &'static str = "pledges";

    fn id(&self) -> &str {
        &self.id
    }

    fn scope_id(&self) -> Option<&str> {
        self.appeal_id.as_deref()
    }
}
