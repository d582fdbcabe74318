//! Partial batch results.

use crate::errors::{DealflowError, RecordFailure, Result};

/// The outcome of a multi-record operation.
///
/// Successful records are committed even when others fail; each failure is
/// reported individually.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome<T> {
    /// Committed items, in submission order.
    pub succeeded: Vec<T>,
    /// Failed items, in submission order.
    pub failed: Vec<RecordFailure>,
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T> BatchOutcome<T> {
    /// Creates an empty outcome.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when nothing failed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of committed items.
    #[must_use]
    pub fn committed(&self) -> usize {
        self.succeeded.len()
    }

    /// A [`DealflowError::PartialBatchFailure`] describing the failures, if any.
    #[must_use]
    pub fn error(&self) -> Option<DealflowError> {
        if self.failed.is_empty() {
            None
        } else {
            Some(DealflowError::PartialBatchFailure {
                committed: self.succeeded.len(),
                failures: self.failed.clone(),
            })
        }
    }

    /// The committed items, or the partial failure when any record failed.
    pub fn into_result(self) -> Result<Vec<T>> {
        match self.error() {
            None => Ok(self.succeeded),
            Some(err) => Err(err),
        }
    }

    pub(crate) fn sort_failures(&mut self) {
        self.failed.sort_by_key(|f| f.index);
    }
}
