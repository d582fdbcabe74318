//! Stage partitioning of a deal snapshot.

use crate::core::{Deal, DealStage};

/// The deals of one stage, in snapshot order.
#[derive(Debug, Clone, PartialEq)]
pub struct StageColumn<'a> {
    /// The stage.
    pub stage: DealStage,
    /// Deals in this stage.
    pub deals: Vec<&'a Deal>,
}

/// A snapshot split into the five stages in funnel order.
///
/// Every deal of the source appears in exactly one column, and each column
/// keeps the relative order of the source.
#[derive(Debug, Clone, PartialEq)]
pub struct StagePartition<'a> {
    columns: [StageColumn<'a>; DealStage::COUNT],
}

impl<'a> StagePartition<'a> {
    /// The column of `stage`.
    #[must_use]
    pub fn column(&self, stage: DealStage) -> &StageColumn<'a> {
        &self.columns[stage.position()]
    }

    /// Columns in funnel order.
    pub fn iter(&self) -> std::slice::Iter<'_, StageColumn<'a>> {
        self.columns.iter()
    }

    /// Total number of deals across all columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.iter().map(|c| c.deals.len()).sum()
    }

    /// Returns true when no column holds a deal.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.iter().all(|c| c.deals.is_empty())
    }
}

impl<'p, 'a> IntoIterator for &'p StagePartition<'a> {
    type Item = &'p StageColumn<'a>;
    type IntoIter = std::slice::Iter<'p, StageColumn<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}

/// Splits `deals` by stage. Stable: nothing is re-sorted.
#[must_use]
pub fn partition_by_stage<'a, I>(deals: I) -> StagePartition<'a>
where
    I: IntoIterator<Item = &'a Deal>,
{
    let mut columns = DealStage::ALL.map(|stage| StageColumn {
        stage,
        deals: Vec::new(),
    });
    for deal in deals {
        columns[deal.stage.position()].deals.push(deal);
    }
    StagePartition { columns }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{assert_partition_covers, DealFixture};

    #[test]
    fn test_partition_preserves_order() {
        let deals = vec![
            DealFixture::new(1).stage(DealStage::Proposal).build(),
            DealFixture::new(2).stage(DealStage::Lead).build(),
            DealFixture::new(3).stage(DealStage::Proposal).build(),
            DealFixture::new(4).stage(DealStage::ClosedWon).build(),
        ];

        let partition = partition_by_stage(&deals);
        let proposal: Vec<i64> = partition
            .column(DealStage::Proposal)
            .deals
            .iter()
            .map(|d| d.id.get())
            .collect();

        assert_eq!(proposal, vec![1, 3]);
        assert!(partition.column(DealStage::Negotiation).deals.is_empty());
        assert_partition_covers(&deals, &partition);
    }

    #[test]
    fn test_partition_funnel_order() {
        let deals: Vec<Deal> = Vec::new();
        let partition = partition_by_stage(&deals);
        let stages: Vec<DealStage> = partition.iter().map(|c| c.stage).collect();
        assert_eq!(stages, DealStage::ALL.to_vec());
        assert!(partition.is_empty());
    }
}
