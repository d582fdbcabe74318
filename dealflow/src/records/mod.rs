//! Record collaborator port.
//!
//! The record service is an opaque store offering generic fetch, create,
//! update and delete by entity name over loosely-typed field maps. The
//! [`deal_record`] codec is the only place that turns those maps into typed
//! [`Deal`](crate::core::Deal) values and back.

pub mod deal_record;
#[cfg(feature = "http")]
pub mod http;
mod memory;

pub use deal_record::{deal_fields, decode_deal, merge_deal, DEAL_ENTITY};
#[cfg(feature = "http")]
pub use http::{HttpRecordConfig, HttpRecordService};
pub use memory::InMemoryRecordService;

use crate::errors::{FailureKind, FieldError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A record as a map of field name to JSON value.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Identifier of a stored record.
pub type RecordId = i64;

/// Collaborator-level failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The service could not be reached.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The service answered with a non-success envelope.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The request or response could not be transported or parsed.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    /// Smallest first.
    #[default]
    Asc,
    /// Largest first.
    Desc,
}

impl SortDirection {
    /// The opposite direction.
    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "asc"),
            Self::Desc => write!(f, "desc"),
        }
    }
}

/// Ordering clause for a fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBy {
    /// Field to sort on.
    pub field_name: String,
    /// Direction.
    #[serde(rename = "sorttype")]
    pub direction: SortDirection,
}

impl OrderBy {
    /// Ascending on `field`.
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field_name: field.into(),
            direction: SortDirection::Asc,
        }
    }

    /// Descending on `field`.
    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field_name: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Parameters of a fetch-all call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchQuery {
    /// Fields to return. Empty means every field.
    pub fields: Vec<String>,
    /// Ordering clauses, applied in order.
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
}

impl FetchQuery {
    /// A query returning the given fields.
    #[must_use]
    pub fn new(fields: Vec<String>) -> Self {
        Self {
            fields,
            order_by: Vec::new(),
        }
    }

    /// Adds an ordering clause.
    #[must_use]
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }
}

/// Per-record outcome of a batch call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordResult {
    /// The record identifier, when known.
    #[serde(default)]
    pub id: Option<RecordId>,
    /// Whether this record succeeded.
    pub success: bool,
    /// The stored record on success.
    #[serde(default)]
    pub data: Option<Record>,
    /// Failure category.
    #[serde(default)]
    pub kind: Option<FailureKind>,
    /// Record-level message.
    #[serde(default)]
    pub message: Option<String>,
    /// Field-level errors.
    #[serde(default)]
    pub errors: Vec<FieldError>,
}

impl RecordResult {
    /// A successful result carrying the stored record.
    #[must_use]
    pub fn ok(id: RecordId, data: Option<Record>) -> Self {
        Self {
            id: Some(id),
            success: true,
            data,
            kind: None,
            message: None,
            errors: Vec::new(),
        }
    }

    /// The identifier does not exist.
    #[must_use]
    pub fn not_found(id: RecordId) -> Self {
        Self {
            id: Some(id),
            success: false,
            data: None,
            kind: Some(FailureKind::NotFound),
            message: Some(format!("Record {id} not found")),
            errors: Vec::new(),
        }
    }

    /// Fields were rejected.
    #[must_use]
    pub fn invalid(id: Option<RecordId>, errors: Vec<FieldError>) -> Self {
        Self {
            id,
            success: false,
            data: None,
            kind: Some(FailureKind::Invalid),
            message: None,
            errors,
        }
    }

    /// Refused for another reason.
    #[must_use]
    pub fn rejected(id: Option<RecordId>, message: impl Into<String>) -> Self {
        Self {
            id,
            success: false,
            data: None,
            kind: Some(FailureKind::Rejected),
            message: Some(message.into()),
            errors: Vec::new(),
        }
    }
}

/// Generic record storage collaborator.
///
/// Batch calls return one [`RecordResult`] per submitted record, in
/// submission order. An `Err` means the whole call failed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordService: Send + Sync {
    /// Fetches every record of `entity`.
    async fn fetch_all(&self, entity: &str, query: &FetchQuery) -> Result<Vec<Record>, RemoteError>;

    /// Fetches one record, `None` if it does not exist.
    async fn fetch_by_id(
        &self,
        entity: &str,
        id: RecordId,
        fields: &[String],
    ) -> Result<Option<Record>, RemoteError>;

    /// Creates records; the service assigns identifiers.
    async fn create_records(
        &self,
        entity: &str,
        records: Vec<Record>,
    ) -> Result<Vec<RecordResult>, RemoteError>;

    /// Updates records by their `id` field. Only the given fields change.
    async fn update_records(
        &self,
        entity: &str,
        records: Vec<Record>,
    ) -> Result<Vec<RecordResult>, RemoteError>;

    /// Deletes records by identifier.
    async fn delete_records(
        &self,
        entity: &str,
        ids: Vec<RecordId>,
    ) -> Result<Vec<RecordResult>, RemoteError>;
}
