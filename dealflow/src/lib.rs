//! # Dealflow
//!
//! The core of a CRM deal pipeline.
//!
//! Dealflow provides:
//!
//! - **Deal Store**: create, update, stage-move and delete deals against a
//!   remote record service, with sample-data and local fallbacks when the
//!   service is unreachable
//! - **Stage state machine**: five funnel stages, each implying a win
//!   probability, with a pluggable transition policy
//! - **Pipeline Board**: kanban columns, per-stage aggregates and pipeline
//!   value derived from the store's current snapshot
//! - **Record collaborator**: the `RecordService` port with in-memory and
//!   HTTP implementations
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dealflow::prelude::*;
//! use std::sync::Arc;
//!
//! let store = Arc::new(DealStore::new(Arc::new(InMemoryRecordService::new())));
//! store.list_all().await?;
//!
//! let deal = store
//!     .create(&DealDraft::new().name("Rollout").company("Acme").value(5000).expected_close_date("2025-03-31"))
//!     .await?;
//!
//! let board = PipelineBoard::new(store);
//! board.request_stage_change(deal.id, "Proposal").await?;
//! println!("{}", board.total_pipeline_value());
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, missing_docs, rust_2018_idioms)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod board;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod records;
pub mod store;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::board::{
        BoardColumn, BoardSummary, DealQuery, DropRequest, PipelineBoard, SortKey, StageAggregate,
    };
    pub use crate::core::{Deal, DealDraft, DealId, DealStage, StageChange, TransitionPolicy};
    pub use crate::errors::{DealflowError, FieldError, Result, ValidationError};
    pub use crate::events::{DealEvent, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::{init_tracing, TracingConfig};
    pub use crate::records::{InMemoryRecordService, RecordService};
    pub use crate::store::{BatchOutcome, DealStore, Origin, RetryConfig, StoreConfig};
    pub use crate::utils::{now_utc, Timestamp};
}
