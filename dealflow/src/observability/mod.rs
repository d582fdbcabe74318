//! Observability utilities.

mod subscriber;
mod timing;

pub use subscriber::{init_tracing, TracingConfig};
pub use timing::SpanTimer;
