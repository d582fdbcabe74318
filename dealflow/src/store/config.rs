//! Store configuration and retry policy.

use crate::errors::Result;
use crate::records::DEAL_ENTITY;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff strategy for retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// delay = base * 2^attempt
    #[default]
    Exponential,
    /// delay = base * (attempt + 1)
    Linear,
    /// delay = base
    Constant,
}

/// Jitter applied on top of the backoff delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    None,
    /// Random from 0 to delay
    #[default]
    Full,
    /// Half fixed, half random
    Equal,
}

/// Retry policy for remote calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Base delay between attempts in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Delay cap in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Backoff strategy.
    #[serde(default)]
    pub backoff_strategy: BackoffStrategy,
    /// Jitter strategy.
    #[serde(default)]
    pub jitter_strategy: JitterStrategy,
}

const fn default_max_attempts() -> usize {
    1
}

const fn default_base_delay_ms() -> u64 {
    200
}

const fn default_max_delay_ms() -> u64 {
    2_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_strategy: BackoffStrategy::default(),
            jitter_strategy: JitterStrategy::default(),
        }
    }
}

impl RetryConfig {
    /// A single attempt, no retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::default()
    }

    /// Default policy for reads: one retry.
    #[must_use]
    pub fn reads() -> Self {
        Self::default().with_max_attempts(2)
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub const fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub const fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub const fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff_strategy = strategy;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub const fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter_strategy = strategy;
        self
    }

    /// Delay to wait after the failed attempt number `attempt` (0-indexed).
    #[must_use]
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let base = self.base_delay_ms;
        let max = self.max_delay_ms;
        let attempt = u32::try_from(attempt).unwrap_or(u32::MAX);

        let delay = match self.backoff_strategy {
            BackoffStrategy::Exponential => base.saturating_mul(2u64.saturating_pow(attempt)),
            BackoffStrategy::Linear => base.saturating_mul(u64::from(attempt) + 1),
            BackoffStrategy::Constant => base,
        }
        .min(max);

        let jittered = match self.jitter_strategy {
            JitterStrategy::None => delay,
            JitterStrategy::Full if delay == 0 => 0,
            JitterStrategy::Full => rand::thread_rng().gen_range(0..=delay),
            JitterStrategy::Equal => {
                let half = delay / 2;
                if half == 0 {
                    delay
                } else {
                    half + rand::thread_rng().gen_range(0..=half)
                }
            }
        };

        Duration::from_millis(jittered)
    }
}

/// Configuration of a [`DealStore`](super::DealStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Entity name of deals in the record service.
    #[serde(default = "default_entity")]
    pub entity: String,
    /// Serve the bundled sample deals when the initial load fails.
    #[serde(default = "default_true")]
    pub sample_fallback: bool,
    /// Synthesize a local record when a create cannot reach the service.
    #[serde(default = "default_true")]
    pub synthesize_on_failure: bool,
    /// Retry policy for fetches.
    #[serde(default = "RetryConfig::reads")]
    pub read_retry: RetryConfig,
    /// Retry policy for writes. Creates are not idempotent, so the default is a single attempt.
    #[serde(default = "RetryConfig::no_retry")]
    pub write_retry: RetryConfig,
}

fn default_entity() -> String {
    DEAL_ENTITY.to_string()
}

const fn default_true() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            entity: default_entity(),
            sample_fallback: true,
            synthesize_on_failure: true,
            read_retry: RetryConfig::reads(),
            write_retry: RetryConfig::no_retry(),
        }
    }
}

impl StoreConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sets the entity name.
    #[must_use]
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = entity.into();
        self
    }

    /// Enables or disables the sample-data fallback.
    #[must_use]
    pub const fn with_sample_fallback(mut self, enabled: bool) -> Self {
        self.sample_fallback = enabled;
        self
    }

    /// Enables or disables local synthesis of failed creates.
    #[must_use]
    pub const fn with_synthesize_on_failure(mut self, enabled: bool) -> Self {
        self.synthesize_on_failure = enabled;
        self
    }

    /// Sets the read retry policy.
    #[must_use]
    pub fn with_read_retry(mut self, retry: RetryConfig) -> Self {
        self.read_retry = retry;
        self
    }

    /// Sets the write retry policy.
    #[must_use]
    pub fn with_write_retry(mut self, retry: RetryConfig) -> Self {
        self.write_retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_config_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.entity, "deal");
        assert!(config.sample_fallback);
        assert_eq!(config.read_retry.max_attempts, 2);
        assert_eq!(config.write_retry.max_attempts, 1);
    }

    #[test]
    fn test_store_config_from_partial_json() {
        let config = StoreConfig::from_json_str(
            r#"{"sample_fallback": false, "read_retry": {"max_attempts": 4, "jitter_strategy": "none"}}"#,
        )
        .unwrap();

        assert!(!config.sample_fallback);
        assert!(config.synthesize_on_failure);
        assert_eq!(config.read_retry.max_attempts, 4);
        assert_eq!(config.read_retry.base_delay_ms, 200);
        assert_eq!(config.read_retry.jitter_strategy, JitterStrategy::None);
        assert_eq!(config.write_retry, RetryConfig::no_retry());
    }

    #[test]
    fn test_store_config_rejects_malformed_json() {
        assert!(StoreConfig::from_json_str("{\"entity\": 5}").is_err());
    }

    #[test]
    fn test_delay_exponential_capped() {
        let retry = RetryConfig::default()
            .with_base_delay_ms(100)
            .with_max_delay_ms(500)
            .with_jitter(JitterStrategy::None);

        assert_eq!(retry.delay_for(0), Duration::from_millis(100));
        assert_eq!(retry.delay_for(2), Duration::from_millis(400));
        assert_eq!(retry.delay_for(10), Duration::from_millis(500));
    }

    #[test]
    fn test_delay_linear_and_constant() {
        let linear = RetryConfig::default()
            .with_base_delay_ms(100)
            .with_backoff(BackoffStrategy::Linear)
            .with_jitter(JitterStrategy::None);
        assert_eq!(linear.delay_for(2), Duration::from_millis(300));

        let constant = linear.with_backoff(BackoffStrategy::Constant);
        assert_eq!(constant.delay_for(7), Duration::from_millis(100));
    }

    #[test]
    fn test_delay_jitter_bounds() {
        let full = RetryConfig::default().with_base_delay_ms(100);
        for _ in 0..50 {
            assert!(full.delay_for(0) <= Duration::from_millis(100));
        }

        let equal = full.with_jitter(JitterStrategy::Equal);
        for _ in 0..50 {
            let delay = equal.delay_for(0);
            assert!(delay >= Duration::from_millis(50) && delay <= Duration::from_millis(100));
        }
    }
}
