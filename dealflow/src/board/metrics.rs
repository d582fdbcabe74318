//! Aggregates derived from a deal snapshot.

use super::partition::partition_by_stage;
use crate::core::{Deal, DealStage};
use serde::Serialize;

/// Count and summed value of a group of deals.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct StageAggregate {
    /// Number of deals.
    pub count: usize,
    /// Sum of values. Non-finite values count as zero.
    pub total_value: f64,
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Count and total value of `deals`.
#[must_use]
pub fn stage_aggregate<'a, I>(deals: I) -> StageAggregate
where
    I: IntoIterator<Item = &'a Deal>,
{
    deals
        .into_iter()
        .fold(StageAggregate::default(), |acc, deal| StageAggregate {
            count: acc.count + 1,
            total_value: acc.total_value + finite_or_zero(deal.value),
        })
}

/// Summed value of every deal not yet won.
#[must_use]
pub fn total_pipeline_value<'a, I>(deals: I) -> f64
where
    I: IntoIterator<Item = &'a Deal>,
{
    deals
        .into_iter()
        .filter(|d| d.is_open())
        .map(|d| finite_or_zero(d.value))
        .sum()
}

/// Value of open deals weighted by their win probability.
#[must_use]
pub fn weighted_pipeline_value<'a, I>(deals: I) -> f64
where
    I: IntoIterator<Item = &'a Deal>,
{
    deals
        .into_iter()
        .filter(|d| d.is_open())
        .map(|d| finite_or_zero(d.weighted_value()))
        .sum()
}

/// Aggregate of one board column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StageSummary {
    /// The stage.
    pub stage: DealStage,
    /// Its aggregate.
    #[serde(flatten)]
    pub aggregate: StageAggregate,
}

/// Board-wide figures used for forecasting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardSummary {
    /// Per-stage aggregates in funnel order.
    pub stages: Vec<StageSummary>,
    /// Number of deals on the board.
    pub deal_count: usize,
    /// Number of deals not yet won.
    pub open_count: usize,
    /// Summed value of open deals.
    pub pipeline_value: f64,
    /// Probability-weighted value of open deals.
    pub weighted_pipeline_value: f64,
    /// Summed value of won deals.
    pub won_value: f64,
}

impl BoardSummary {
    /// Derives the summary from a snapshot.
    #[must_use]
    pub fn from_deals(deals: &[Deal]) -> Self {
        let partition = partition_by_stage(deals);
        let stages: Vec<StageSummary> = partition
            .iter()
            .map(|column| StageSummary {
                stage: column.stage,
                aggregate: stage_aggregate(column.deals.iter().copied()),
            })
            .collect();
        let won = partition.column(DealStage::ClosedWon);

        Self {
            stages,
            deal_count: deals.len(),
            open_count: deals.len() - won.deals.len(),
            pipeline_value: total_pipeline_value(deals),
            weighted_pipeline_value: weighted_pipeline_value(deals),
            won_value: stage_aggregate(won.deals.iter().copied()).total_value,
        }
    }

    /// The aggregate of `stage`.
    #[must_use]
    pub fn stage(&self, stage: DealStage) -> StageAggregate {
        self.stages
            .iter()
            .find(|s| s.stage == stage)
            .map(|s| s.aggregate)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::DealFixture;

    fn board() -> Vec<Deal> {
        vec![
            DealFixture::new(1).stage(DealStage::Lead).value(100.0).build(),
            DealFixture::new(2).stage(DealStage::ClosedWon).value(200.0).build(),
            DealFixture::new(3).stage(DealStage::Qualified).value(50.0).build(),
        ]
    }

    #[test]
    fn test_total_pipeline_value_excludes_won() {
        assert!((total_pipeline_value(&board()) - 150.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_stage_aggregate() {
        let empty: Vec<Deal> = Vec::new();
        assert_eq!(
            stage_aggregate(&empty),
            StageAggregate {
                count: 0,
                total_value: 0.0
            }
        );
    }

    #[test]
    fn test_non_finite_values_count_as_zero() {
        let deals = vec![
            DealFixture::new(1).value(f64::NAN).build(),
            DealFixture::new(2).value(40.0).build(),
        ];
        let aggregate = stage_aggregate(&deals);
        assert_eq!(aggregate.count, 2);
        assert!((aggregate.total_value - 40.0).abs() < f64::EPSILON);
        assert!((total_pipeline_value(&deals) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_weighted_pipeline_value() {
        // 100 * 20% + 50 * 40%
        assert!((weighted_pipeline_value(&board()) - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_board_summary() {
        let summary = BoardSummary::from_deals(&board());

        assert_eq!(summary.deal_count, 3);
        assert_eq!(summary.open_count, 2);
        assert!((summary.won_value - 200.0).abs() < f64::EPSILON);
        assert_eq!(summary.stages.len(), DealStage::COUNT);
        assert_eq!(summary.stage(DealStage::Lead).count, 1);
        assert_eq!(summary.stage(DealStage::Proposal), StageAggregate::default());

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["stages"][4]["stage"], "Closed Won");
        assert_eq!(json["stages"][4]["count"], 1);
    }
}
