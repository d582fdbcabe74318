//! Core domain model types for the deal pipeline.
//!
//! This module contains the fundamental types used throughout the crate:
//! - The funnel stage enum and its probability mapping
//! - The deal entity, raw drafts and validated fields
//! - The stage transition table

mod deal;
mod stage;
mod transition;

pub(crate) use deal::probability_from_f64;
pub use deal::{Deal, DealDraft, DealFields, DealId, StageChange};
pub use stage::{DealStage, UnknownStageError};
pub use transition::TransitionPolicy;
