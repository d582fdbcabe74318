//! Testing utilities for deal pipelines.
//!
//! This module provides:
//! - Deal fixtures and sample drafts
//! - Seeding helpers for the in-memory record service
//! - Assertions for stage consistency and board partitions

mod assertions;
mod fixtures;

pub use assertions::{assert_partition_covers, assert_stage_consistent};
pub use fixtures::{sample_draft, seed_deals, DealFixture};
