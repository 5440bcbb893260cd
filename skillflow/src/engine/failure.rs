//! Failure bookkeeping for a run.
//!
//! Hard node failures are recorded here; the scheduler consults the
//! collector to propagate failures to dependents and to decide whether to
//! keep scheduling.

use crate::errors::WorkflowError;
use crate::utils::{now_utc, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::str::FromStr;

/// How the scheduler reacts to a hard node failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Fail dependents, keep running unrelated branches.
    #[default]
    ContinueOnFailure,
    /// Stop scheduling further levels after the first failure.
    FailFast,
}

impl FromStr for FailureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "continue_on_failure" | "continue" => Ok(Self::ContinueOnFailure),
            "fail_fast" => Ok(Self::FailFast),
            other => Err(format!("unknown failure mode '{other}'")),
        }
    }
}

/// A node that failed, directly or because a predecessor failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// The failed node.
    pub node_id: String,
    /// Error message.
    pub error: String,
    /// Error type name.
    pub error_type: String,
    /// The failed predecessor, when this failure was propagated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caused_by: Option<String>,
    /// When the failure was recorded.
    pub timestamp: Timestamp,
}

impl FailureRecord {
    /// Creates a record for a node that ran and failed.
    #[must_use]
    pub fn new(
        node_id: impl Into<String>,
        error: impl Into<String>,
        error_type: impl Into<String>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            error: error.into(),
            error_type: error_type.into(),
            caused_by: None,
            timestamp: now_utc(),
        }
    }

    /// Creates a record for a node failed by a predecessor.
    #[must_use]
    pub fn propagated(node_id: impl Into<String>, predecessor: impl Into<String>) -> Self {
        let predecessor = predecessor.into();
        Self {
            node_id: node_id.into(),
            error: format!("Predecessor '{predecessor}' failed"),
            error_type: "UpstreamFailure".to_string(),
            caused_by: Some(predecessor),
            timestamp: now_utc(),
        }
    }

    /// Returns true if the node never ran.
    #[must_use]
    pub const fn is_propagated(&self) -> bool {
        self.caused_by.is_some()
    }

    /// Converts to a dictionary representation.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the record cannot be encoded.
    pub fn to_dict(&self) -> Result<Value, WorkflowError> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Collects failures and completions during a run.
#[derive(Debug, Default)]
pub struct FailureCollector {
    /// Failure mode.
    pub mode: FailureMode,
    failures: Vec<FailureRecord>,
    failed_nodes: HashSet<String>,
    completed_nodes: HashSet<String>,
}

impl FailureCollector {
    /// Creates a new failure collector.
    #[must_use]
    pub fn new(mode: FailureMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Records a node failure.
    pub fn record_failure(&mut self, record: FailureRecord) {
        self.failed_nodes.insert(record.node_id.clone());
        self.failures.push(record);
    }

    /// Records a node completion.
    pub fn record_completion(&mut self, node_id: &str) {
        self.completed_nodes.insert(node_id.to_string());
    }

    /// Returns true if the node has failed.
    #[must_use]
    pub fn has_failed(&self, node_id: &str) -> bool {
        self.failed_nodes.contains(node_id)
    }

    /// Returns true if the node has completed.
    #[must_use]
    pub fn has_completed(&self, node_id: &str) -> bool {
        self.completed_nodes.contains(node_id)
    }

    /// Returns true if the node is already resolved either way.
    #[must_use]
    pub fn is_resolved(&self, node_id: &str) -> bool {
        self.has_failed(node_id) || self.has_completed(node_id)
    }

    /// Returns the first failed node among `predecessors`.
    #[must_use]
    pub fn failed_predecessor<'a>(&self, predecessors: &'a [String]) -> Option<&'a str> {
        predecessors
            .iter()
            .find(|p| self.failed_nodes.contains(p.as_str()))
            .map(String::as_str)
    }

    /// Returns true if scheduling should stop under the configured mode.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        match self.mode {
            FailureMode::FailFast => !self.failures.is_empty(),
            FailureMode::ContinueOnFailure => false,
        }
    }

    /// Returns true if any node failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Returns all failures in record order.
    #[must_use]
    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    /// Returns the failures of nodes that actually ran.
    pub fn root_failures(&self) -> impl Iterator<Item = &FailureRecord> {
        self.failures.iter().filter(|f| !f.is_propagated())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_mode_default_and_parse() {
        assert_eq!(FailureMode::default(), FailureMode::ContinueOnFailure);
        assert_eq!("fail-fast".parse::<FailureMode>(), Ok(FailureMode::FailFast));
        assert_eq!(
            " Continue_On_Failure ".parse::<FailureMode>(),
            Ok(FailureMode::ContinueOnFailure)
        );
        assert!("sometimes".parse::<FailureMode>().is_err());
    }

    #[test]
    fn test_record_and_query() {
        let mut collector = FailureCollector::new(FailureMode::ContinueOnFailure);
        collector.record_completion("B");
        collector.record_failure(FailureRecord::new("A", "boom", "NodeExecutionError"));

        assert!(collector.has_failed("A"));
        assert!(collector.has_completed("B"));
        assert!(collector.is_resolved("A") && collector.is_resolved("B"));
        assert!(!collector.is_resolved("C"));
        assert!(!collector.should_stop());

        let preds = vec!["B".to_string(), "A".to_string()];
        assert_eq!(collector.failed_predecessor(&preds), Some("A"));
        assert_eq!(collector.failed_predecessor(&preds[..1]), None);
    }

    #[test]
    fn test_fail_fast_stops() {
        let mut collector = FailureCollector::new(FailureMode::FailFast);
        assert!(!collector.should_stop());
        collector.record_failure(FailureRecord::new("A", "boom", "NodeExecutionError"));
        assert!(collector.should_stop());
    }

    #[test]
    fn test_propagated_records() {
        let mut collector = FailureCollector::default();
        collector.record_failure(FailureRecord::new("A", "boom", "NodeExecutionError"));
        collector.record_failure(FailureRecord::propagated("C", "A"));

        assert_eq!(collector.failures().len(), 2);
        let roots: Vec<_> = collector.root_failures().map(|f| f.node_id.as_str()).collect();
        assert_eq!(roots, vec!["A"]);
        assert_eq!(collector.failures()[1].to_dict().unwrap()["caused_by"], "A");
    }
}
