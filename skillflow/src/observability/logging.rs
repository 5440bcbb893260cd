//! Process-wide `tracing` subscriber setup.
//!
//! The filter is taken from `SKILLFLOW_LOG`, then `RUST_LOG`, then the
//! configured default level.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Primary environment variable for the log filter.
pub const ENV_LOG: &str = "SKILLFLOW_LOG";
/// Fallback environment variable for the log filter.
pub const ENV_RUST_LOG: &str = "RUST_LOG";

/// Subscriber options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracingOptions {
    /// Emit one JSON object per line instead of human-readable text.
    #[serde(default)]
    pub json: bool,
    /// Filter used when neither environment variable is set.
    #[serde(default = "default_level")]
    pub default_level: String,
    /// Include the event target (module path).
    #[serde(default = "default_true")]
    pub with_target: bool,
}

fn default_level() -> String {
    "info".to_string()
}

const fn default_true() -> bool {
    true
}

impl Default for TracingOptions {
    fn default() -> Self {
        Self {
            json: false,
            default_level: default_level(),
            with_target: true,
        }
    }
}

impl TracingOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables JSON output.
    #[must_use]
    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }

    /// Sets the fallback filter.
    #[must_use]
    pub fn with_default_level(mut self, level: impl Into<String>) -> Self {
        self.default_level = level.into();
        self
    }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Fails if the filter does not parse or a global subscriber is already set.
pub fn init_tracing(options: &TracingOptions) -> anyhow::Result<()> {
    let directives = filter_directives(options, |name| std::env::var(name).ok());
    let filter = EnvFilter::try_new(&directives)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(options.with_target)
        .with_thread_ids(false)
        .with_thread_names(false);

    if options.json {
        builder
            .json()
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install subscriber: {e}"))
    } else {
        builder
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install subscriber: {e}"))
    }
}

/// Picks the filter directives, accepting `warning` as an alias of `warn`.
fn filter_directives<F>(options: &TracingOptions, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(ENV_LOG)
        .or_else(|| lookup(ENV_RUST_LOG))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| options.default_level.clone());

    if raw.eq_ignore_ascii_case("warning") {
        "warn".to_string()
    } else {
        raw
    }
}
