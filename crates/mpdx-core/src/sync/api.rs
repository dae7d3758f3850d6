//! Remote API seam.
//!
//! No transport lives in this crate. Clients plug an HTTP implementation in
//! behind [`PledgeApi`]; tests use an in-memory fake.

use std::future::Future;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{ChangeAware, Entity, Pledge, FIELD_UPDATED_IN_DB_AT};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Network failure or timeout; the request can be retried later.
    #[error("Transient API failure: {0}")]
    Transient(String),
    #[error("API rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Remote record not found: {0}")]
    NotFound(String),
}

impl ApiError {
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Server-side failures are logged quietly; the record stays dirty and is
    /// retried on the next dirty sync.
    pub const fn is_server_error(&self) -> bool {
        matches!(self, Self::Rejected { status, .. } if *status >= 500)
    }
}

/// One page of a paged list response
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub const fn new(data: Vec<T>, total_pages: u32) -> Self {
        Self { data, total_pages }
    }
}

/// Attributes to send for an update: the dirty fields of a record plus its
/// `updated_in_db_at` so the server can detect conflicting writes.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialUpdate {
    pub entity_type: &'static str,
    pub id: String,
    pub attributes: Map<String, Value>,
}

impl PartialUpdate {
    pub fn from_entity<T: Entity>(item: &T) -> Result<Self> {
        let Value::Object(mut attributes) = serde_json::to_value(item)? else {
            return Err(Error::InvalidInput(format!(
                "{} {} did not serialize to an object",
                T::ENTITY_TYPE,
                item.id()
            )));
        };
        let changed = item.changed_fields();
        attributes.retain(|name, _| changed.contains(name) || name == FIELD_UPDATED_IN_DB_AT);

        Ok(Self {
            entity_type: T::ENTITY_TYPE,
            id: item.id().to_string(),
            attributes,
        })
    }

    pub fn contains(&self, field: &str) -> bool {
        self.attributes.contains_key(field)
    }
}

/// Pledge endpoints of the remote API
pub trait PledgeApi: Send + Sync {
    fn get_pledges(
        &self,
        account_list_id: &str,
        appeal_id: &str,
        page: u32,
        per_page: u32,
    ) -> impl Future<Output = std::result::Result<Page<Pledge>, ApiError>> + Send;

    fn create_pledge(
        &self,
        account_list_id: &str,
        pledge: &Pledge,
    ) -> impl Future<Output = std::result::Result<Pledge, ApiError>> + Send;

    fn update_pledge(
        &self,
        account_list_id: &str,
        update: &PartialUpdate,
    ) -> impl Future<Output = std::result::Result<Pledge, ApiError>> + Send;

    fn delete_pledge(
        &self,
        account_list_id: &str,
        pledge_id: &str,
    ) -> impl Future<Output = std::result::Result<(), ApiError>> + Send;
}

/// Fetch page 1, then the remaining pages it reports, up to `limit` pages.
///
/// Every response is returned, failures included, so the caller can save
/// what arrived and decide whether orphan deletion is safe. A failed first
/// page counts as a single-page result.
pub async fn fetch_pages<T, F, Fut>(
    limit: Option<u32>,
    mut fetch_page: F,
) -> Vec<std::result::Result<Page<T>, ApiError>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<Page<T>, ApiError>>,
{
    let first = fetch_page(1).await;
    let total_pages = first.as_ref().map_or(1, |page| page.total_pages.max(1));
    let pages = match limit {
        Some(limit) if limit > 0 => total_pages.min(limit),
        _ => total_pages,
    };

    let mut responses = Vec::new();
    responses.push(first);
    for page in 2..=pages {
        responses.push(fetch_page(page).await);
    }
    responses
}
