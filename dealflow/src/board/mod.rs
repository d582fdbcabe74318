//! The Pipeline Board.
//!
//! A stage-partitioned view over the [`DealStore`] snapshot. The board holds
//! no copy of the deals: every query re-derives columns and aggregates from
//! the store's current snapshot. Stage changes requested by drag and drop
//! are checked against the [`TransitionPolicy`] and handed to
//! [`DealStore::update_stage`]; nothing moves until the store confirms.

mod filter;
mod metrics;
mod partition;

pub use filter::{DealQuery, SortKey, SortSpec};
pub use metrics::{
    stage_aggregate, total_pipeline_value, weighted_pipeline_value, BoardSummary, StageAggregate,
    StageSummary,
};
pub use partition::{partition_by_stage, StageColumn, StagePartition};

use crate::core::{Deal, DealId, DealStage, TransitionPolicy, UnknownStageError};
use crate::errors::{DealflowError, Result, ValidationError};
use crate::store::DealStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Payload of a card dropped on a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DropRequest {
    /// The dragged deal.
    pub deal_id: DealId,
    /// Label of the column it was dropped on.
    pub target_stage: String,
}

/// An owned board column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardColumn {
    /// The stage.
    pub stage: DealStage,
    /// Count and total value of the column.
    pub aggregate: StageAggregate,
    /// The column's deals in snapshot order.
    pub deals: Vec<Deal>,
}

/// Kanban board over a deal store.
#[derive(Debug, Clone)]
pub struct PipelineBoard {
    store: Arc<DealStore>,
    policy: TransitionPolicy,
}

impl PipelineBoard {
    /// Creates a board with the any-to-any transition policy.
    #[must_use]
    pub fn new(store: Arc<DealStore>) -> Self {
        Self {
            store,
            policy: TransitionPolicy::default(),
        }
    }

    /// Replaces the transition policy.
    #[must_use]
    pub fn with_policy(mut self, policy: TransitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &Arc<DealStore> {
        &self.store
    }

    /// The transition policy.
    #[must_use]
    pub const fn policy(&self) -> &TransitionPolicy {
        &self.policy
    }

    /// The five columns in funnel order, derived from the current snapshot.
    #[must_use]
    pub fn columns(&self) -> Vec<BoardColumn> {
        let snapshot = self.store.snapshot();
        partition_by_stage(snapshot.iter())
            .iter()
            .map(|column| BoardColumn {
                stage: column.stage,
                aggregate: stage_aggregate(column.deals.iter().copied()),
                deals: column.deals.iter().map(|d| (*d).clone()).collect(),
            })
            .collect()
    }

    /// Board-wide figures for the current snapshot.
    #[must_use]
    pub fn summary(&self) -> BoardSummary {
        BoardSummary::from_deals(&self.store.snapshot().deals)
    }

    /// Open-pipeline value of the current snapshot.
    #[must_use]
    pub fn total_pipeline_value(&self) -> f64 {
        total_pipeline_value(self.store.snapshot().iter())
    }

    /// Deals of the current snapshot matching `query`.
    #[must_use]
    pub fn search(&self, query: &DealQuery) -> Vec<Deal> {
        let snapshot = self.store.snapshot();
        query.apply(&snapshot.deals).into_iter().cloned().collect()
    }

    /// Moves a deal to the stage labelled `target_stage`.
    ///
    /// Unknown labels are a validation error on the `stage` field. A move
    /// the policy forbids fails with
    /// [`DealflowError::TransitionNotAllowed`] before any remote call.
    pub async fn request_stage_change(&self, deal_id: DealId, target_stage: &str) -> Result<Deal> {
        let target: DealStage = target_stage
            .parse()
            .map_err(|e: UnknownStageError| ValidationError::single("stage", e.to_string()))?;

        if let Some(current) = self.store.snapshot().get(deal_id) {
            if !self.policy.allows(current.stage, target) {
                return Err(DealflowError::TransitionNotAllowed {
                    from: current.stage,
                    to: target,
                });
            }
        }

        debug!(deal_id = %deal_id, stage = %target, "Stage change requested");
        self.store.update_stage(deal_id, target).await
    }

    /// Handles a drop event payload.
    pub async fn handle_drop(&self, request: DropRequest) -> Result<Deal> {
        self.request_stage_change(request.deal_id, &request.target_stage)
            .await
    }
}
