//! Immutable views of the deal collection.

use crate::core::{Deal, DealId};
use std::sync::Arc;

/// The full deal collection at one version.
///
/// Observers always receive the whole collection, never a delta.
#[derive(Debug, Clone, Default)]
pub struct DealSnapshot {
    /// Incremented on every change.
    pub version: u64,
    /// Deals ordered by creation time, newest first.
    pub deals: Arc<Vec<Deal>>,
}

impl DealSnapshot {
    /// Number of deals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.deals.len()
    }

    /// Returns true when there are no deals.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deals.is_empty()
    }

    /// Looks up a deal.
    #[must_use]
    pub fn get(&self, id: DealId) -> Option<&Deal> {
        self.deals.iter().find(|d| d.id == id)
    }

    /// Iterates the deals in snapshot order.
    pub fn iter(&self) -> std::slice::Iter<'_, Deal> {
        self.deals.iter()
    }
}

impl<'a> IntoIterator for &'a DealSnapshot {
    type Item = &'a Deal;
    type IntoIter = std::slice::Iter<'a, Deal>;

    fn into_iter(self) -> Self::IntoIter {
        self.deals.iter()
    }
}
