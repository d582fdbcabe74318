//! Error types for the deal pipeline.
//!
//! `NotFound`, `Validation` and `Rejected` are meant for inline display next
//! to the offending form or card. `RemoteUnavailable` is usually recovered by
//! the store's fallback policy before it reaches a caller.

use crate::core::{DealId, DealStage};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, DealflowError>;

/// The main error type for deal pipeline operations.
#[derive(Debug, Error)]
pub enum DealflowError {
    /// No deal with this identifier exists.
    #[error("Deal not found: {id}")]
    NotFound {
        /// The missing identifier.
        id: DealId,
    },

    /// A required field was missing or malformed.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// The record service could not be reached or returned a failure envelope.
    #[error("Record service unavailable during {operation}: {reason}")]
    RemoteUnavailable {
        /// The store operation that was attempted.
        operation: String,
        /// The underlying cause.
        reason: String,
    },

    /// Some records of a batch failed; the rest were committed.
    #[error("{} record(s) failed, {committed} committed", failures.len())]
    PartialBatchFailure {
        /// Number of records that were committed.
        committed: usize,
        /// One entry per failed record.
        failures: Vec<RecordFailure>,
    },

    /// The record service refused a record without field-level detail.
    #[error("Record rejected: {message}")]
    Rejected {
        /// The record identifier, when known.
        id: Option<DealId>,
        /// The reason given by the service.
        message: String,
    },

    /// The transition policy does not permit this move.
    #[error("Stage transition not allowed: {from} -> {to}")]
    TransitionNotAllowed {
        /// Current stage.
        from: DealStage,
        /// Requested stage.
        to: DealStage,
    },

    /// A record returned by the service could not be decoded into a deal.
    #[error("Record decode error: {0}")]
    Decode(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DealflowError {
    /// Creates a remote-unavailable error for an operation.
    #[must_use]
    pub fn remote_unavailable(operation: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::RemoteUnavailable {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns true for [`DealflowError::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true for [`DealflowError::RemoteUnavailable`].
    #[must_use]
    pub const fn is_remote_unavailable(&self) -> bool {
        matches!(self, Self::RemoteUnavailable { .. })
    }

    /// Returns the field errors carried by this error, if any.
    #[must_use]
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::Validation(err) => &err.errors,
            _ => &[],
        }
    }

    /// Converts to a JSON object suitable for inline UI display.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let kind = match self {
            Self::NotFound { .. } => "NotFound",
            Self::Validation(_) => "ValidationError",
            Self::RemoteUnavailable { .. } => "RemoteUnavailable",
            Self::PartialBatchFailure { .. } => "PartialBatchFailure",
            Self::Rejected { .. } => "Rejected",
            Self::TransitionNotAllowed { .. } => "TransitionNotAllowed",
            Self::Decode(_) => "DecodeError",
            Self::Serialization(_) => "SerializationError",
            Self::Internal(_) => "InternalError",
        };

        let mut value = serde_json::json!({
            "type": kind,
            "message": self.to_string(),
        });

        match self {
            Self::Validation(err) => {
                value["errors"] = serde_json::json!(err.errors);
            }
            Self::PartialBatchFailure { committed, failures } => {
                value["committed"] = serde_json::json!(committed);
                value["failures"] = serde_json::json!(failures);
            }
            Self::NotFound { id } => {
                value["id"] = serde_json::json!(id);
            }
            _ => {}
        }

        value
    }
}

/// A problem with a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// The field name.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl FieldError {
    /// Creates a new field error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// One or more invalid fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    /// Every failing field, in the order they were checked.
    pub errors: Vec<FieldError>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        write!(f, "Validation failed: {}", parts.join("; "))
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    /// Creates an empty validation error.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a validation error for a single field.
    #[must_use]
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError::new(field, message)],
        }
    }

    /// Records a failing field.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    /// Returns true if no field failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns true if the named field failed.
    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// `Ok(value)` when no field failed, otherwise `Err(self)`.
    pub fn into_result<T>(self, value: T) -> std::result::Result<T, Self> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

/// Why a single record in a batch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The identifier does not exist.
    NotFound,
    /// One or more fields were rejected.
    Invalid,
    /// Refused for another reason.
    Rejected,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Invalid => write!(f, "invalid"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// A failed record within a batch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFailure {
    /// Position of the record in the submitted batch.
    pub index: usize,
    /// The record identifier, when known.
    pub id: Option<DealId>,
    /// Failure category.
    pub kind: FailureKind,
    /// Record-level message.
    pub message: Option<String>,
    /// Field-level details.
    #[serde(default)]
    pub errors: Vec<FieldError>,
}

impl RecordFailure {
    /// Creates a failure of the given kind.
    #[must_use]
    pub const fn new(index: usize, kind: FailureKind) -> Self {
        Self {
            index,
            id: None,
            kind,
            message: None,
            errors: Vec::new(),
        }
    }

    /// Sets the record identifier.
    #[must_use]
    pub const fn with_id(mut self, id: DealId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the field errors.
    #[must_use]
    pub fn with_errors(mut self, errors: Vec<FieldError>) -> Self {
        self.errors = errors;
        self
    }

    /// Converts a single failed record into the matching typed error.
    #[must_use]
    pub fn into_error(self) -> DealflowError {
        match self.kind {
            FailureKind::NotFound => match self.id {
                Some(id) => DealflowError::NotFound { id },
                None => DealflowError::Rejected {
                    id: None,
                    message: self.message.unwrap_or_else(|| "record not found".to_string()),
                },
            },
            FailureKind::Invalid if !self.errors.is_empty() => {
                DealflowError::Validation(ValidationError {
                    errors: self.errors,
                })
            }
            FailureKind::Invalid | FailureKind::Rejected => DealflowError::Rejected {
                id: self.id,
                message: self
                    .message
                    .unwrap_or_else(|| "record rejected by service".to_string()),
            },
        }
    }
}
