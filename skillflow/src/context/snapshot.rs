//! Serializable state of an execution context.

use crate::core::{ExecutionStatus, LogLevel};
use crate::utils::{now_utc, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A completed node's output with its completion time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeOutputRecord {
    /// The node output payload.
    pub output: Value,
    /// When the output was recorded.
    pub timestamp: Timestamp,
}

impl NodeOutputRecord {
    /// Wraps an output stamped with the current time.
    #[must_use]
    pub fn new(output: Value) -> Self {
        Self {
            output,
            timestamp: now_utc(),
        }
    }

    /// Returns the `{output, timestamp}` form used by `$nodes` references.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "output": self.output,
            "timestamp": self.timestamp,
        })
    }
}

/// One entry of the in-memory run log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Severity.
    pub level: LogLevel,
    /// Human-readable message.
    pub message: String,
    /// The node the entry concerns, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    /// Structured extra data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// When the entry was appended.
    pub timestamp: Timestamp,
}

/// Node counters for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStatistics {
    /// Number of nodes in the graph.
    pub total: usize,
    /// Nodes that resolved successfully (including continue-on-error).
    pub completed: usize,
    /// Nodes that failed or were failed by propagation.
    pub failed: usize,
}

impl ExecutionStatistics {
    /// Nodes neither completed nor failed.
    #[must_use]
    pub const fn pending(&self) -> usize {
        self.total.saturating_sub(self.completed + self.failed)
    }
}

/// A point-in-time copy of an execution context.
///
/// This is the shape returned to callers in the final result and accepted
/// back by [`ExecutionContext::from_snapshot`](super::ExecutionContext::from_snapshot).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    /// Execution id.
    pub execution_id: String,
    /// Workflow id.
    pub workflow_id: String,
    /// Run status.
    pub status: ExecutionStatus,
    /// The most recently dispatched node.
    #[serde(default)]
    pub current_node_id: Option<String>,
    /// Variable store.
    #[serde(default)]
    pub variables: HashMap<String, Value>,
    /// Node output slots.
    #[serde(default)]
    pub node_outputs: HashMap<String, NodeOutputRecord>,
    /// Ordered run log.
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    /// Node counters.
    #[serde(default)]
    pub statistics: ExecutionStatistics,
    /// Whether cancellation was requested.
    #[serde(default)]
    pub cancelled: bool,
    /// The cancellation reason, if any.
    #[serde(default)]
    pub cancel_reason: Option<String>,
    /// When the run started.
    #[serde(default)]
    pub started_at: Option<Timestamp>,
    /// When the run finished.
    #[serde(default)]
    pub finished_at: Option<Timestamp>,
    /// Seconds between start and finish, when both are set.
    #[serde(default)]
    pub execution_time: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_value_shape() {
        let record = NodeOutputRecord::new(json!({"n": 1}));
        let value = record.to_value();
        assert_eq!(value["output"], json!({"n": 1}));
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_statistics_pending() {
        let stats = ExecutionStatistics {
            total: 5,
            completed: 2,
            failed: 1,
        };
        assert_eq!(stats.pending(), 2);
    }

    #[test]
    fn test_snapshot_defaults_from_minimal_json() {
        let snapshot: ContextSnapshot = serde_json::from_value(json!({
            "execution_id": "e1",
            "workflow_id": "w1",
            "status": "pending"
        }))
        .unwrap();
        assert_eq!(snapshot.status, ExecutionStatus::Pending);
        assert!(snapshot.variables.is_empty());
        assert_eq!(snapshot.statistics, ExecutionStatistics::default());
        assert!(snapshot.started_at.is_none());
    }
}
