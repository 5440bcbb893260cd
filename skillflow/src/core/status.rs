//! Execution status, node type and log level enums.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The type of a workflow node, as spelled in definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// The single entry point of a workflow.
    Start,
    /// A terminal marker whose output is aggregated into the result.
    End,
    /// Invokes an external skill.
    Skill,
    /// Evaluates ordered conditions.
    Condition,
    /// Reshapes data from references.
    Transform,
    /// Fans out to several branch nodes.
    Parallel,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::End => write!(f, "end"),
            Self::Skill => write!(f, "skill"),
            Self::Condition => write!(f, "condition"),
            Self::Transform => write!(f, "transform"),
            Self::Parallel => write!(f, "parallel"),
        }
    }
}

impl FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Self::Start),
            "end" => Ok(Self::End),
            "skill" => Ok(Self::Skill),
            "condition" => Ok(Self::Condition),
            "transform" => Ok(Self::Transform),
            "parallel" => Ok(Self::Parallel),
            other => Err(format!("unknown node type '{other}'")),
        }
    }
}

/// The status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Created but not started.
    #[default]
    Pending,
    /// Levels are being dispatched.
    Running,
    /// Every scheduled node resolved without a hard failure.
    Completed,
    /// At least one node failed hard.
    Failed,
    /// The cancel signal stopped the run.
    Cancelled,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl ExecutionStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Severity of an execution log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Verbose diagnostics.
    Debug,
    /// Normal progress.
    Info,
    /// Recoverable problems.
    Warning,
    /// Failures.
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}
