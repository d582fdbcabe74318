//! Bundled sample deals served when the record service is unreachable.

use crate::core::{Deal, DealId};
use crate::records::{decode_deal, Record};
use tracing::warn;

const SAMPLE_DEALS: &str = include_str!("../../data/sample_deals.json");

/// Decodes the bundled dataset, newest first.
///
/// Entries that fail to decode are skipped and logged.
#[must_use]
pub fn sample_deals() -> Vec<Deal> {
    let records: Vec<Record> = match serde_json::from_str(SAMPLE_DEALS) {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, "Bundled sample deals are not valid JSON");
            return Vec::new();
        }
    };

    let mut deals: Vec<Deal> = records
        .into_iter()
        .filter_map(|record| match decode_deal(record) {
            Ok(deal) => Some(deal),
            Err(e) => {
                warn!(error = %e, "Skipping malformed sample deal");
                None
            }
        })
        .collect();
    deals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    deals
}

/// Finds one sample deal.
#[must_use]
pub fn sample_deal(id: DealId) -> Option<Deal> {
    sample_deals().into_iter().find(|d| d.id == id)
}
