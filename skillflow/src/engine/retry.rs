//! Per-node retry and recovery.
//!
//! A node is attempted up to `max_retries + 1` times with a backoff sleep
//! between attempts. When the attempts are exhausted the node's error
//! handling decides the outcome: run a fallback node, continue with an
//! error payload, or fail with [`NodeExecutionError`].

use crate::context::ExecutionContext;
use crate::core::LogLevel;
use crate::errors::{NodeExecutionError, WorkflowError};
use crate::events::{event_types, EventSink};
use crate::executor::NodeExecutor;
use crate::graph::{Graph, Node};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff strategy for retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// delay = initial
    #[serde(alias = "constant")]
    Fixed,
    /// delay = initial * n
    Linear,
    /// delay = initial * 2^(n-1)
    #[default]
    Exponential,
}

/// Jitter applied to a computed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// Use the delay as computed.
    #[default]
    None,
    /// Random from 0 to delay.
    Full,
    /// Half fixed, half random.
    Equal,
}

fn default_initial_delay() -> f64 {
    1.0
}

fn default_max_delay() -> f64 {
    60.0
}

/// Retry settings for a node.
///
/// Delays are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    #[serde(default, alias = "maxRetries")]
    pub max_retries: u32,
    /// Backoff strategy.
    #[serde(
        default,
        alias = "backoff_kind",
        alias = "backoff_strategy",
        alias = "backoffStrategy"
    )]
    pub backoff: BackoffStrategy,
    /// Delay before the first retry.
    #[serde(default = "default_initial_delay", alias = "initialDelay")]
    pub initial_delay: f64,
    /// Upper bound for any single delay.
    #[serde(default = "default_max_delay", alias = "maxDelay")]
    pub max_delay: f64,
    /// Jitter strategy.
    #[serde(default)]
    pub jitter: JitterStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            backoff: BackoffStrategy::Exponential,
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            jitter: JitterStrategy::None,
        }
    }
}

impl RetryConfig {
    /// Creates a config with no retries.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the retry count.
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff = strategy;
        self
    }

    /// Sets the initial delay in seconds.
    #[must_use]
    pub fn with_initial_delay(mut self, seconds: f64) -> Self {
        self.initial_delay = seconds;
        self
    }

    /// Sets the maximum delay in seconds.
    #[must_use]
    pub fn with_max_delay(mut self, seconds: f64) -> Self {
        self.max_delay = seconds;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter = strategy;
        self
    }

    /// Total attempts allowed, including the first.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay in seconds before retry `n` (1-indexed), without jitter.
    #[must_use]
    pub fn base_delay_seconds(&self, n: u32) -> f64 {
        let initial = self.initial_delay.max(0.0);
        let delay = match self.backoff {
            BackoffStrategy::Fixed => initial,
            BackoffStrategy::Linear => initial * f64::from(n.max(1)),
            BackoffStrategy::Exponential => {
                let exp = i32::try_from(n.saturating_sub(1)).unwrap_or(i32::MAX);
                initial * 2f64.powi(exp)
            }
        };
        delay.min(self.max_delay.max(0.0))
    }

    /// Delay before retry `n` (1-indexed), with jitter applied.
    #[must_use]
    pub fn delay_for_attempt(&self, n: u32) -> Duration {
        let delay = self.base_delay_seconds(n);
        let jittered = match self.jitter {
            JitterStrategy::None => delay,
            _ if delay <= 0.0 => 0.0,
            JitterStrategy::Full => rand::thread_rng().gen_range(0.0..=delay),
            JitterStrategy::Equal => {
                let half = delay / 2.0;
                half + rand::thread_rng().gen_range(0.0..=half)
            }
        };
        Duration::try_from_secs_f64(jittered).unwrap_or(Duration::MAX)
    }
}

/// Runs a node under its retry and error-handling policy.
pub struct RetryPolicy<'a> {
    executor: &'a NodeExecutor,
    events: &'a dyn EventSink,
    default_retry: &'a RetryConfig,
}

impl<'a> RetryPolicy<'a> {
    /// Creates a policy; `default_retry` applies to nodes without their own.
    #[must_use]
    pub fn new(
        executor: &'a NodeExecutor,
        events: &'a dyn EventSink,
        default_retry: &'a RetryConfig,
    ) -> Self {
        Self {
            executor,
            events,
            default_retry,
        }
    }

    /// Attempts `node` until it succeeds or its retries run out.
    ///
    /// Cancellation is checked before every attempt and cuts a backoff
    /// sleep short.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Cancelled`] if cancellation is observed, or
    /// [`WorkflowError::NodeExecution`] when retries are exhausted and the
    /// node has neither a usable fallback nor `continue_on_error`.
    pub async fn run(
        &self,
        node: &Node,
        graph: &Graph,
        ctx: &ExecutionContext,
    ) -> Result<Value, WorkflowError> {
        let config = node.retry.as_ref().unwrap_or(self.default_retry);
        let max_attempts = config.max_attempts();
        let mut attempt = 0;

        let last_error = loop {
            ctx.check_cancelled()?;
            attempt += 1;

            match self.executor.execute(node, graph, ctx).await {
                Ok(output) => {
                    if attempt > 1 {
                        debug!(node_id = %node.id, attempt, "Node succeeded after retry");
                    }
                    return Ok(output);
                }
                Err(e) if attempt >= max_attempts => break e,
                Err(e) => {
                    let delay = config.delay_for_attempt(attempt);
                    let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                    warn!(
                        execution_id = ctx.execution_id(),
                        node_id = %node.id,
                        attempt,
                        delay_ms,
                        error = %e,
                        "Node attempt failed, retrying"
                    );
                    ctx.add_log(
                        LogLevel::Warning,
                        format!("Attempt {attempt}/{max_attempts} failed: {e}"),
                        Some(node.id.as_str()),
                        Some(json!({ "attempt": attempt, "delay_ms": delay_ms })),
                    );
                    self.events.try_emit(
                        event_types::NODE_RETRYING,
                        Some(json!({
                            "execution_id": ctx.execution_id(),
                            "node_id": node.id,
                            "attempt": attempt,
                            "delay_ms": delay_ms,
                            "error": e.to_string(),
                        })),
                    );

                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = ctx.cancellation_token().cancelled() => {}
                    }
                }
            }
        };

        self.recover(node, graph, ctx, attempt, &last_error).await
    }

    async fn recover(
        &self,
        node: &Node,
        graph: &Graph,
        ctx: &ExecutionContext,
        attempts: u32,
        error: &WorkflowError,
    ) -> Result<Value, WorkflowError> {
        let message = error.to_string();
        let handling = &node.error_handling;

        if let Some(fallback_id) = &handling.fallback_node_id {
            if let Some(fallback) = graph.node(fallback_id) {
                ctx.add_log(
                    LogLevel::Warning,
                    format!("Running fallback node '{fallback_id}'"),
                    Some(node.id.as_str()),
                    Some(json!({ "error": message })),
                );
                return Ok(match self.executor.execute(fallback, graph, ctx).await {
                    Ok(result) => json!({ "fallback_result": result, "original_error": message }),
                    Err(fallback_error) => {
                        json!({ "error": message, "fallback_error": fallback_error.to_string() })
                    }
                });
            }
            ctx.add_log(
                LogLevel::Warning,
                format!("Fallback node '{fallback_id}' not found"),
                Some(node.id.as_str()),
                None,
            );
        }

        if handling.continue_on_error {
            ctx.add_log(
                LogLevel::Warning,
                format!("Continuing after error: {message}"),
                Some(node.id.as_str()),
                None,
            );
            return Ok(json!({ "error": message, "continued": true }));
        }

        Err(NodeExecutionError::new(&node.id, attempts, message).into())
    }
}
