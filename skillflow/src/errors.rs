//! Error types for the skillflow engine.
//!
//! Structural problems with a definition surface as [`DagValidationError`]
//! before anything runs. Per-node failures that survive the retry policy
//! become [`NodeExecutionError`], and an observed cancel signal becomes
//! [`ExecutionCancelledError`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for skillflow operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The workflow definition is not a valid DAG.
    #[error("{0}")]
    Validation(#[from] DagValidationError),

    /// A node exhausted its retries with no recovery policy.
    #[error("{0}")]
    NodeExecution(#[from] NodeExecutionError),

    /// The run observed its cancellation signal.
    #[error("{0}")]
    Cancelled(#[from] ExecutionCancelledError),

    /// A node output slot was written twice.
    #[error("{0}")]
    OutputConflict(#[from] OutputConflictError),

    /// The run input does not satisfy the variable definitions.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The external skill capability reported an error.
    #[error("Skill '{skill}' failed: {source}")]
    Skill {
        /// The skill id or slug.
        skill: String,
        /// The underlying error.
        #[source]
        source: anyhow::Error,
    },

    /// A node body failed for a reason local to its configuration.
    #[error("Node '{node_id}' failed: {message}")]
    Node {
        /// The node id.
        node_id: String,
        /// The failure message.
        message: String,
    },

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WorkflowError {
    /// Creates a node-local failure.
    #[must_use]
    pub fn node(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Node {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Wraps an error reported by the skill capability.
    #[must_use]
    pub fn skill(skill: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Skill {
            skill: skill.into(),
            source,
        }
    }

    /// Returns true if this error stems from cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Returns a short type name used in reports.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "DAGValidationError",
            Self::NodeExecution(_) => "NodeExecutionError",
            Self::Cancelled(_) => "ExecutionCancelledError",
            Self::OutputConflict(_) => "OutputConflictError",
            Self::InvalidInput(_) => "InvalidInputError",
            Self::Skill { .. } => "SkillError",
            Self::Node { .. } => "NodeError",
            Self::Internal(_) => "InternalError",
            Self::Serialization(_) => "SerializationError",
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = match self {
            Self::Validation(err) => err.to_dict(),
            Self::NodeExecution(err) => err.to_dict(),
            _ => HashMap::new(),
        };
        map.insert("type".to_string(), serde_json::json!(self.kind()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

/// Metadata about a validation error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ErrorInfo {
    /// Error code (e.g., "DAG-004-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ErrorInfo {
    /// Creates a new error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::Value::String(self.code.clone()));
        map.insert("summary".to_string(), serde_json::Value::String(self.summary.clone()));

        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::Value::String(hint.clone()));
        }
        if !self.context.is_empty() {
            let context_map: serde_json::Map<String, serde_json::Value> = self
                .context
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            map.insert("context".to_string(), serde_json::Value::Object(context_map));
        }

        map
    }
}

/// Error raised when a workflow definition is not a valid DAG.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct DagValidationError {
    /// The error message.
    pub message: String,
    /// The nodes involved in the error.
    pub nodes: Vec<String>,
    /// Optional error info.
    pub error_info: Option<ErrorInfo>,
}

impl DagValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            nodes: Vec::new(),
            error_info: None,
        }
    }

    /// No start node, or more than one.
    #[must_use]
    pub fn start_node(message: impl Into<String>, nodes: Vec<String>) -> Self {
        let message = message.into();
        let info = ErrorInfo::new("DAG-001-START", message.clone())
            .with_fix_hint("A workflow needs exactly one node of type 'start'.");
        Self::new(message).with_nodes(nodes).with_error_info(info)
    }

    /// Two nodes share an id.
    #[must_use]
    pub fn duplicate_node(node_id: impl Into<String>) -> Self {
        let node_id = node_id.into();
        let message = format!("Duplicate node id '{node_id}'");
        let info = ErrorInfo::new("DAG-002-DUPLICATE", message.clone());
        Self::new(message).with_nodes(vec![node_id]).with_error_info(info)
    }

    /// An edge is malformed or references a missing node.
    #[must_use]
    pub fn edge(edge_id: impl Into<String>, message: impl Into<String>) -> Self {
        let edge_id = edge_id.into();
        let message = format!("Invalid edge '{}': {}", edge_id, message.into());
        let info = ErrorInfo::new("DAG-003-EDGE", message.clone())
            .with_context_entry("edge", edge_id)
            .with_fix_hint("Check edge endpoints for typos in node ids.");
        Self::new(message).with_error_info(info)
    }

    /// The graph contains a cycle.
    #[must_use]
    pub fn cycle(cycle_path: Vec<String>) -> Self {
        let message = format!("cycle detected: {}", cycle_path.join(" -> "));
        let info = ErrorInfo::new("DAG-004-CYCLE", message.clone())
            .with_fix_hint("Remove one of the edges in the cycle to break it.");
        Self::new(message).with_nodes(cycle_path).with_error_info(info)
    }

    /// A node entry is malformed.
    #[must_use]
    pub fn node(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        let node_id = node_id.into();
        let message = format!("Invalid node '{}': {}", node_id, message.into());
        let info = ErrorInfo::new("DAG-005-NODE", message.clone());
        Self::new(message).with_nodes(vec![node_id]).with_error_info(info)
    }

    /// Sets the nodes involved.
    #[must_use]
    pub fn with_nodes(mut self, nodes: Vec<String>) -> Self {
        self.nodes = nodes;
        self
    }

    /// Sets the error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("message".to_string(), serde_json::Value::String(self.message.clone()));
        map.insert(
            "nodes".to_string(),
            serde_json::Value::Array(
                self.nodes
                    .iter()
                    .map(|s| serde_json::Value::String(s.clone()))
                    .collect(),
            ),
        );
        if let Some(ref info) = self.error_info {
            let info_map: serde_json::Map<String, serde_json::Value> =
                info.to_dict().into_iter().collect();
            map.insert("error_info".to_string(), serde_json::Value::Object(info_map));
        }
        map
    }
}

/// Error raised when a node exhausts its retries and has no recovery policy.
#[derive(Debug, Clone, Error)]
#[error("Node '{node_id}' failed after {attempts} attempt(s): {message}")]
pub struct NodeExecutionError {
    /// The failing node.
    pub node_id: String,
    /// Number of attempts made.
    pub attempts: u32,
    /// The last error message.
    pub message: String,
}

impl NodeExecutionError {
    /// Creates a new node execution error.
    #[must_use]
    pub fn new(node_id: impl Into<String>, attempts: u32, message: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            attempts,
            message: message.into(),
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("node_id".to_string(), serde_json::json!(self.node_id));
        map.insert("attempts".to_string(), serde_json::json!(self.attempts));
        map.insert("error".to_string(), serde_json::json!(self.message));
        map
    }
}

/// Error raised when a check observes the cancel signal.
#[derive(Debug, Clone, Error)]
#[error("Execution cancelled: {reason}")]
pub struct ExecutionCancelledError {
    /// The reason recorded when cancellation was requested.
    pub reason: String,
}

impl ExecutionCancelledError {
    /// Creates a new cancellation error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Error raised when writing a node output slot that is already filled.
#[derive(Debug, Clone, Error)]
#[error("Output conflict: node '{node_id}' already has an output")]
pub struct OutputConflictError {
    /// The node id.
    pub node_id: String,
}

impl OutputConflictError {
    /// Creates a new output conflict error.
    #[must_use]
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
        }
    }
}
