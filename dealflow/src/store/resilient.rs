//! The resilient call wrapper used by every store operation.
//!
//! A remote call is attempted under a [`RetryConfig`]. When every attempt
//! fails, the operation's [`Fallback`] strategy decides whether a locally
//! produced value stands in or the failure propagates as
//! [`DealflowError::RemoteUnavailable`].

use super::config::RetryConfig;
use crate::errors::{DealflowError, Result};
use crate::observability::SpanTimer;
use crate::records::RemoteError;
use std::fmt;
use std::future::Future;
use tracing::{debug, warn};

/// What a failed remote call degrades to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// Serve the bundled sample dataset.
    SampleData,
    /// Serve the in-memory cache.
    LocalCache,
    /// Keep the write as a locally synthesized record.
    SynthesizedRecord,
    /// No fallback; report the failure.
    Propagate,
}

impl fmt::Display for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SampleData => write!(f, "sample_data"),
            Self::LocalCache => write!(f, "local_cache"),
            Self::SynthesizedRecord => write!(f, "synthesized_record"),
            Self::Propagate => write!(f, "propagate"),
        }
    }
}

/// Result of a resilient call.
#[derive(Debug)]
pub enum Resolved<T> {
    /// The remote call succeeded.
    Remote(T),
    /// The remote call failed and the fallback produced a value.
    Degraded {
        /// The fallback value.
        value: T,
        /// The strategy that produced it.
        strategy: Fallback,
        /// The remote failure.
        reason: RemoteError,
    },
}

impl<T> Resolved<T> {
    /// Returns true when the value came from a fallback.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// The value, wherever it came from.
    pub fn into_value(self) -> T {
        match self {
            Self::Remote(value) | Self::Degraded { value, .. } => value,
        }
    }
}

/// Retries transient remote failures.
///
/// `Rejected` envelopes are answers, not outages, and are never retried.
pub async fn with_retry<T, F, Fut>(
    retry: &RetryConfig,
    operation: &str,
    mut call: F,
) -> std::result::Result<T, RemoteError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, RemoteError>>,
{
    let attempts = retry.max_attempts.max(1);
    let mut attempt = 0;
    let timer = SpanTimer::start(operation);

    loop {
        match call().await {
            Ok(value) => {
                debug!(
                    operation,
                    attempts = attempt + 1,
                    duration_ms = timer.finish(),
                    "Remote call succeeded"
                );
                return Ok(value);
            }
            Err(err @ RemoteError::Rejected(_)) => return Err(err),
            Err(err) => {
                attempt += 1;
                if attempt >= attempts {
                    debug!(
                        operation,
                        attempts = attempt,
                        duration_ms = timer.elapsed_ms(),
                        "Remote call gave up"
                    );
                    return Err(err);
                }
                let delay = retry.delay_for(attempt - 1);
                debug!(
                    operation,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "Retrying remote call"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Runs `call` with retries, then applies `strategy` on failure.
///
/// `fallback` produces the stand-in value; returning `None` (or using
/// [`Fallback::Propagate`]) turns the failure into
/// [`DealflowError::RemoteUnavailable`].
pub async fn resilient<T, F, Fut, G>(
    retry: &RetryConfig,
    operation: &str,
    strategy: Fallback,
    call: F,
    fallback: G,
) -> Result<Resolved<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, RemoteError>>,
    G: FnOnce() -> Option<T>,
{
    let reason = match with_retry(retry, operation, call).await {
        Ok(value) => return Ok(Resolved::Remote(value)),
        Err(reason) => reason,
    };

    let value = match strategy {
        Fallback::Propagate => None,
        _ => fallback(),
    };

    match value {
        Some(value) => {
            warn!(operation, strategy = %strategy, error = %reason, "Remote call failed, using fallback");
            Ok(Resolved::Degraded {
                value,
                strategy,
                reason,
            })
        }
        None => {
            warn!(operation, error = %reason, "Remote call failed");
            Err(DealflowError::remote_unavailable(operation, reason))
        }
    }
}
