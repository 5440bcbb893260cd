//! Engine configuration.

use super::failure::FailureMode;
use super::retry::RetryConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Environment variable overriding [`EngineConfig::max_concurrent_nodes`].
pub const ENV_MAX_CONCURRENT_NODES: &str = "SKILLFLOW_MAX_CONCURRENT_NODES";
/// Environment variable overriding [`EngineConfig::failure_mode`].
pub const ENV_FAILURE_MODE: &str = "SKILLFLOW_FAILURE_MODE";

/// Settings shared by every run of an engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on nodes running at once within a level.
    #[serde(default = "default_max_concurrent_nodes")]
    pub max_concurrent_nodes: usize,
    /// Reaction to a hard node failure.
    #[serde(default)]
    pub failure_mode: FailureMode,
    /// Retry policy for nodes that do not configure one.
    #[serde(default)]
    pub default_retry: RetryConfig,
    /// Attach node outputs to completion log entries.
    #[serde(default)]
    pub log_node_outputs: bool,
}

fn default_max_concurrent_nodes() -> usize {
    10
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_nodes: default_max_concurrent_nodes(),
            failure_mode: FailureMode::default(),
            default_retry: RetryConfig::default(),
            log_node_outputs: false,
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads overrides from the process environment.
    ///
    /// Unparseable values are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads overrides through `lookup`, which maps a variable name to its
    /// value.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_MAX_CONCURRENT_NODES) {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.max_concurrent_nodes = n,
                _ => warn!(var = ENV_MAX_CONCURRENT_NODES, value = %raw, "Ignoring invalid value"),
            }
        }

        if let Some(raw) = lookup(ENV_FAILURE_MODE) {
            match raw.parse::<FailureMode>() {
                Ok(mode) => config.failure_mode = mode,
                Err(e) => warn!(var = ENV_FAILURE_MODE, error = %e, "Ignoring invalid value"),
            }
        }

        config
    }

    /// Sets the concurrency bound; zero is raised to one.
    #[must_use]
    pub fn with_max_concurrent_nodes(mut self, n: usize) -> Self {
        self.max_concurrent_nodes = n.max(1);
        self
    }

    /// Sets the failure mode.
    #[must_use]
    pub fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    /// Sets the default retry policy.
    #[must_use]
    pub fn with_default_retry(mut self, retry: RetryConfig) -> Self {
        self.default_retry = retry;
        self
    }

    /// Enables or disables node outputs in completion logs.
    #[must_use]
    pub fn with_log_node_outputs(mut self, enabled: bool) -> Self {
        self.log_node_outputs = enabled;
        self
    }
}
