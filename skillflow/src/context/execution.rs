//! The mutable per-run execution context.

use super::reference::{lookup, Reference, ReferenceRoot};
use super::snapshot::{ContextSnapshot, ExecutionStatistics, LogEntry, NodeOutputRecord};
use super::variables::{seed_variables, VariableDefinition};
use crate::cancellation::CancellationToken;
use crate::core::{ExecutionStatus, LogLevel};
use crate::errors::{OutputConflictError, WorkflowError};
use crate::utils::{elapsed_seconds, now_utc, Timestamp};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

/// The mutable state of one workflow run.
///
/// Shared behind an `Arc` by the scheduler and every concurrently running
/// node. Each field sits behind its own lock so sibling nodes only contend
/// on what they touch; `variables` writes are last-writer-wins.
pub struct ExecutionContext {
    execution_id: String,
    workflow_id: String,
    variables: RwLock<HashMap<String, Value>>,
    node_outputs: RwLock<HashMap<String, NodeOutputRecord>>,
    status: RwLock<ExecutionStatus>,
    current_node_id: RwLock<Option<String>>,
    logs: RwLock<Vec<LogEntry>>,
    statistics: RwLock<ExecutionStatistics>,
    started_at: RwLock<Option<Timestamp>>,
    finished_at: RwLock<Option<Timestamp>>,
    cancel: CancellationToken,
}

impl ExecutionContext {
    /// Creates a pending context with `variables["input"]` seeded from `input`.
    #[must_use]
    pub fn new(execution_id: impl Into<String>, workflow_id: impl Into<String>, input: Value) -> Self {
        let mut variables = HashMap::new();
        variables.insert("input".to_string(), input);
        Self::with_variables(execution_id.into(), workflow_id.into(), variables)
    }

    /// Creates a context after applying variable definitions to `input`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidInput`] when a required variable is
    /// missing.
    pub fn with_definitions(
        execution_id: impl Into<String>,
        workflow_id: impl Into<String>,
        input: Value,
        definitions: &[VariableDefinition],
    ) -> Result<Self, WorkflowError> {
        let (_, variables) = seed_variables(input, definitions)?;
        Ok(Self::with_variables(
            execution_id.into(),
            workflow_id.into(),
            variables,
        ))
    }

    fn with_variables(
        execution_id: String,
        workflow_id: String,
        variables: HashMap<String, Value>,
    ) -> Self {
        Self {
            execution_id,
            workflow_id,
            variables: RwLock::new(variables),
            node_outputs: RwLock::new(HashMap::new()),
            status: RwLock::new(ExecutionStatus::Pending),
            current_node_id: RwLock::new(None),
            logs: RwLock::new(Vec::new()),
            statistics: RwLock::new(ExecutionStatistics::default()),
            started_at: RwLock::new(None),
            finished_at: RwLock::new(None),
            cancel: CancellationToken::new(),
        }
    }

    /// Returns the execution id.
    #[must_use]
    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    /// Returns the workflow id.
    #[must_use]
    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    // Variables

    /// Sets a variable, replacing any previous value.
    pub fn set_variable(&self, name: impl Into<String>, value: Value) {
        self.variables.write().insert(name.into(), value);
    }

    /// Returns a variable, or `default` when it is not set.
    #[must_use]
    pub fn get_variable(&self, name: &str, default: Value) -> Value {
        self.variables.read().get(name).cloned().unwrap_or(default)
    }

    /// Returns a copy of the variable store.
    #[must_use]
    pub fn variables(&self) -> HashMap<String, Value> {
        self.variables.read().clone()
    }

    /// Returns the run input payload.
    #[must_use]
    pub fn input(&self) -> Value {
        self.get_variable("input", Value::Null)
    }

    // References

    /// Resolves a `$root.path` reference; anything else is returned as-is.
    #[must_use]
    pub fn resolve_reference(&self, expr: &Value) -> Value {
        match expr {
            Value::String(s) => match Reference::parse(s) {
                Some(reference) => self.resolve(&reference),
                None => expr.clone(),
            },
            other => other.clone(),
        }
    }

    /// Resolves a parsed reference against the current state.
    #[must_use]
    pub fn resolve(&self, reference: &Reference) -> Value {
        let path = reference.path.as_slice();
        match &reference.root {
            ReferenceRoot::Input => lookup(&self.input(), path),
            ReferenceRoot::Nodes => {
                let outputs = self.node_outputs.read();
                match path.split_first() {
                    Some((id, rest)) => outputs
                        .get(id)
                        .map_or(Value::Null, |record| lookup(&record.to_value(), rest)),
                    None => Value::Object(
                        outputs
                            .iter()
                            .map(|(id, record)| (id.clone(), record.to_value()))
                            .collect(),
                    ),
                }
            }
            ReferenceRoot::Variables => {
                let variables = self.variables.read();
                match path.split_first() {
                    Some((name, rest)) => variables
                        .get(name)
                        .map_or(Value::Null, |value| lookup(value, rest)),
                    None => Value::Object(
                        variables
                            .iter()
                            .map(|(k, v)| (k.clone(), v.clone()))
                            .collect(),
                    ),
                }
            }
            ReferenceRoot::Variable(name) => self
                .variables
                .read()
                .get(name)
                .map_or(Value::Null, |value| lookup(value, path)),
        }
    }

    /// Resolves references recursively through objects and arrays.
    #[must_use]
    pub fn resolve_value(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.resolve_value(v)))
                    .collect::<Map<String, Value>>(),
            ),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.resolve_value(v)).collect())
            }
            other => self.resolve_reference(other),
        }
    }

    // Node outputs

    /// Records a node's output. Each slot may be written once per run.
    ///
    /// # Errors
    ///
    /// Returns [`OutputConflictError`] if the slot is already filled.
    pub fn set_node_output(
        &self,
        node_id: impl Into<String>,
        output: Value,
    ) -> Result<(), OutputConflictError> {
        let node_id = node_id.into();
        let mut outputs = self.node_outputs.write();
        if outputs.contains_key(&node_id) {
            return Err(OutputConflictError::new(node_id));
        }
        outputs.insert(node_id, NodeOutputRecord::new(output));
        Ok(())
    }

    /// Returns a node's output payload.
    #[must_use]
    pub fn get_node_output(&self, node_id: &str) -> Option<Value> {
        self.node_outputs
            .read()
            .get(node_id)
            .map(|record| record.output.clone())
    }

    /// Returns whether a node's output slot is filled.
    #[must_use]
    pub fn has_node_output(&self, node_id: &str) -> bool {
        self.node_outputs.read().contains_key(node_id)
    }

    /// Returns a copy of all node output records.
    #[must_use]
    pub fn node_outputs(&self) -> HashMap<String, NodeOutputRecord> {
        self.node_outputs.read().clone()
    }

    // Status

    /// Returns the run status.
    #[must_use]
    pub fn status(&self) -> ExecutionStatus {
        *self.status.read()
    }

    /// Returns the most recently dispatched node.
    #[must_use]
    pub fn current_node_id(&self) -> Option<String> {
        self.current_node_id.read().clone()
    }

    /// Records the most recently dispatched node.
    pub fn set_current_node(&self, node_id: impl Into<String>) {
        *self.current_node_id.write() = Some(node_id.into());
    }

    // Cancellation

    /// Returns the run's cancellation token.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Requests cancellation. Returns false if it was already requested.
    pub fn request_cancel(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        let first = self.cancel.cancel(reason.clone());
        if first {
            self.add_log(
                LogLevel::Warning,
                format!("Cancellation requested: {reason}"),
                None,
                None,
            );
        }
        first
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns the cancellation reason, if any.
    #[must_use]
    pub fn cancel_reason(&self) -> Option<String> {
        self.cancel.reason()
    }

    /// Fails if cancellation has been requested.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Cancelled`] carrying the stored reason.
    pub fn check_cancelled(&self) -> Result<(), WorkflowError> {
        Ok(self.cancel.check()?)
    }

    // Logs

    /// Appends a log entry and mirrors it to `tracing`.
    pub fn add_log(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        node_id: Option<&str>,
        metadata: Option<Value>,
    ) {
        let message = message.into();
        let execution_id = self.execution_id.as_str();
        match level {
            LogLevel::Debug => debug!(execution_id, node_id, "{message}"),
            LogLevel::Info => info!(execution_id, node_id, "{message}"),
            LogLevel::Warning => warn!(execution_id, node_id, "{message}"),
            LogLevel::Error => error!(execution_id, node_id, "{message}"),
        }

        self.logs.write().push(LogEntry {
            level,
            message,
            node_id: node_id.map(String::from),
            metadata,
            timestamp: now_utc(),
        });
    }

    /// Returns a copy of the run log.
    #[must_use]
    pub fn logs(&self) -> Vec<LogEntry> {
        self.logs.read().clone()
    }

    // Statistics

    /// Returns the node counters.
    #[must_use]
    pub fn statistics(&self) -> ExecutionStatistics {
        *self.statistics.read()
    }

    /// Starts a fresh count over `total` nodes.
    ///
    /// Counts carried over from a restored snapshot are dropped; the
    /// scheduler recounts nodes that already have outputs.
    pub fn reset_statistics(&self, total: usize) {
        *self.statistics.write() = ExecutionStatistics {
            total,
            completed: 0,
            failed: 0,
        };
    }

    /// Counts one completed node.
    pub fn record_completed(&self) {
        self.statistics.write().completed += 1;
    }

    /// Counts one failed node.
    pub fn record_failed(&self) {
        self.statistics.write().failed += 1;
    }

    // Lifecycle

    /// Marks the run as running and records the start time.
    pub fn start(&self) {
        *self.status.write() = ExecutionStatus::Running;
        *self.started_at.write() = Some(now_utc());
    }

    /// Marks the run completed or failed and records the end time.
    pub fn finish(&self, success: bool) {
        *self.status.write() = if success {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Failed
        };
        *self.finished_at.write() = Some(now_utc());
    }

    /// Marks the run cancelled and records the end time.
    pub fn mark_cancelled(&self) {
        *self.status.write() = ExecutionStatus::Cancelled;
        *self.finished_at.write() = Some(now_utc());
    }

    /// Returns the start time.
    #[must_use]
    pub fn started_at(&self) -> Option<Timestamp> {
        *self.started_at.read()
    }

    /// Returns the end time.
    #[must_use]
    pub fn finished_at(&self) -> Option<Timestamp> {
        *self.finished_at.read()
    }

    /// Seconds from start to finish, when both are recorded.
    #[must_use]
    pub fn execution_time(&self) -> Option<f64> {
        match (self.started_at(), self.finished_at()) {
            (Some(start), Some(end)) => Some(elapsed_seconds(start, end)),
            _ => None,
        }
    }

    // Serialization

    /// Captures the full state.
    #[must_use]
    pub fn to_snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            execution_id: self.execution_id.clone(),
            workflow_id: self.workflow_id.clone(),
            status: self.status(),
            current_node_id: self.current_node_id(),
            variables: self.variables(),
            node_outputs: self.node_outputs(),
            logs: self.logs(),
            statistics: self.statistics(),
            cancelled: self.is_cancelled(),
            cancel_reason: self.cancel_reason(),
            started_at: self.started_at(),
            finished_at: self.finished_at(),
            execution_time: self.execution_time(),
        }
    }

    /// Rebuilds a context from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: ContextSnapshot) -> Self {
        let ctx = Self {
            execution_id: snapshot.execution_id,
            workflow_id: snapshot.workflow_id,
            variables: RwLock::new(snapshot.variables),
            node_outputs: RwLock::new(snapshot.node_outputs),
            status: RwLock::new(snapshot.status),
            current_node_id: RwLock::new(snapshot.current_node_id),
            logs: RwLock::new(snapshot.logs),
            statistics: RwLock::new(snapshot.statistics),
            started_at: RwLock::new(snapshot.started_at),
            finished_at: RwLock::new(snapshot.finished_at),
            cancel: CancellationToken::new(),
        };
        if snapshot.cancelled {
            ctx.cancel
                .cancel(snapshot.cancel_reason.unwrap_or_else(|| "cancelled".to_string()));
        }
        ctx
    }

    /// Serializes the full state to a JSON value.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if a stored value cannot be encoded.
    pub fn to_dict(&self) -> Result<Value, WorkflowError> {
        Ok(serde_json::to_value(self.to_snapshot())?)
    }

    /// Rebuilds a context from [`to_dict`](Self::to_dict) output.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the value does not have the
    /// snapshot shape.
    pub fn from_dict(value: Value) -> Result<Self, WorkflowError> {
        let snapshot: ContextSnapshot = serde_json::from_value(value)?;
        Ok(Self::from_snapshot(snapshot))
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("execution_id", &self.execution_id)
            .field("workflow_id", &self.workflow_id)
            .field("status", &self.status())
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}
