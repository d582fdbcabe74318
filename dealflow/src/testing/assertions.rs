//! Assertions over deals and board partitions.

use crate::board::StagePartition;
use crate::core::{Deal, DealId};
use std::collections::HashMap;

/// Asserts that the deal's probability is the one its stage implies.
pub fn assert_stage_consistent(deal: &Deal) {
    assert!(
        deal.has_stage_probability(),
        "Deal {} is in {} with probability {}, expected {}",
        deal.id,
        deal.stage,
        deal.probability,
        deal.stage.probability()
    );
}

/// Asserts that every deal of `source` appears exactly once in `partition`,
/// in the column of its stage.
pub fn assert_partition_covers(source: &[Deal], partition: &StagePartition<'_>) {
    let mut seen: HashMap<DealId, usize> = HashMap::new();
    for column in partition {
        for deal in &column.deals {
            assert_eq!(
                deal.stage, column.stage,
                "Deal {} is in the {} column but has stage {}",
                deal.id, column.stage, deal.stage
            );
            *seen.entry(deal.id).or_default() += 1;
        }
    }

    assert_eq!(
        partition.len(),
        source.len(),
        "Partition holds {} deals, source has {}",
        partition.len(),
        source.len()
    );
    for deal in source {
        assert_eq!(
            seen.get(&deal.id).copied(),
            Some(1),
            "Deal {} should appear exactly once",
            deal.id
        );
    }
}
