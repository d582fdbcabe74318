//! Subscriber installation for binaries and examples.

use crate::errors::{DealflowError, Result};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, EnvFilter};

fn default_directive() -> String {
    "info".to_string()
}

/// How log output is filtered and formatted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracingConfig {
    /// Filter used when `RUST_LOG` is unset, e.g. `info` or `dealflow=debug`.
    #[serde(default = "default_directive")]
    pub default_directive: String,
    /// Emit one JSON object per line instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_directive: default_directive(),
            json: false,
        }
    }
}

impl TracingConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the fallback filter directive.
    #[must_use]
    pub fn with_default_directive(mut self, directive: impl Into<String>) -> Self {
        self.default_directive = directive.into();
        self
    }

    /// Switches to JSON output.
    #[must_use]
    pub const fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    fn filter(&self) -> Result<EnvFilter> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.default_directive).map_err(|e| {
                DealflowError::Internal(format!(
                    "invalid filter directive '{}': {e}",
                    self.default_directive
                ))
            }),
        }
    }
}

/// Installs the global subscriber.
///
/// Fails if the directive is malformed or a subscriber is already set.
pub fn init_tracing(config: &TracingConfig) -> Result<()> {
    let filter = config.filter()?;
    let builder = fmt().with_env_filter(filter).with_target(true);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| DealflowError::Internal(format!("failed to install subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config: TracingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, TracingConfig::default());
        assert_eq!(config.default_directive, "info");
        assert!(!config.json);
    }

    #[test]
    fn test_builders() {
        let config = TracingConfig::new()
            .with_default_directive("dealflow=debug")
            .with_json(true);
        assert_eq!(config.default_directive, "dealflow=debug");
        assert!(config.json);
    }

    #[test]
    fn test_invalid_directive() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = TracingConfig::new().with_default_directive("dealflow=loudest");
        assert!(init_tracing(&config).is_err());
    }
}
