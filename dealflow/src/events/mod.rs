//! Domain events emitted by the deal store.
//!
//! Every mutation of the deal collection emits one event after the cache has
//! been reconciled. Degraded paths additionally emit `deal.fallback`.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use crate::core::{DealId, DealStage};
use serde_json::json;

/// A store-level domain event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DealEvent {
    /// The collection was (re)loaded.
    Loaded {
        /// Number of deals in the new snapshot.
        count: usize,
        /// `"remote"` or `"sample"`.
        source: &'static str,
    },
    /// A deal was created.
    Created {
        /// The new identifier.
        deal_id: DealId,
        /// True when the record was synthesized locally.
        local: bool,
    },
    /// A deal's fields were replaced.
    Updated {
        /// The deal.
        deal_id: DealId,
    },
    /// A deal moved to another stage.
    StageChanged {
        /// The deal.
        deal_id: DealId,
        /// Previous stage.
        from: DealStage,
        /// New stage.
        to: DealStage,
        /// Probability derived from the new stage.
        probability: u8,
    },
    /// Deals were removed.
    Deleted {
        /// Removed identifiers.
        deal_ids: Vec<DealId>,
    },
    /// A remote call failed and a fallback was applied.
    Fallback {
        /// The store operation.
        operation: String,
        /// The fallback that was used.
        strategy: String,
        /// The remote failure.
        reason: String,
    },
}

impl DealEvent {
    /// The dotted event type name.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::Loaded { .. } => "deals.loaded",
            Self::Created { .. } => "deal.created",
            Self::Updated { .. } => "deal.updated",
            Self::StageChanged { .. } => "deal.stage_changed",
            Self::Deleted { .. } => "deal.deleted",
            Self::Fallback { .. } => "deal.fallback",
        }
    }

    /// The event payload as JSON.
    #[must_use]
    pub fn data(&self) -> serde_json::Value {
        match self {
            Self::Loaded { count, source } => json!({"count": count, "source": source}),
            Self::Created { deal_id, local } => json!({"deal_id": deal_id, "local": local}),
            Self::Updated { deal_id } => json!({"deal_id": deal_id}),
            Self::StageChanged {
                deal_id,
                from,
                to,
                probability,
            } => json!({
                "deal_id": deal_id,
                "from": from,
                "to": to,
                "probability": probability,
            }),
            Self::Deleted { deal_ids } => json!({"deal_ids": deal_ids}),
            Self::Fallback {
                operation,
                strategy,
                reason,
            } => json!({"operation": operation, "strategy": strategy, "reason": reason}),
        }
    }
}
