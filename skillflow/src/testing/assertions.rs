//! Assertions for execution results.

use serde_json::Value;

use crate::core::ExecutionStatus;
use crate::engine::ExecutionResult;

/// Asserts that the run completed.
pub fn assert_completed(result: &ExecutionResult) {
    assert_eq!(
        result.status,
        ExecutionStatus::Completed,
        "Expected completed run, got {:?} with error {:?}",
        result.status,
        result.error
    );
}

/// Asserts that the run failed.
pub fn assert_failed(result: &ExecutionResult) {
    assert_eq!(
        result.status,
        ExecutionStatus::Failed,
        "Expected failed run, got {:?}",
        result.status
    );
}

/// Asserts that the run was cancelled.
pub fn assert_cancelled(result: &ExecutionResult) {
    assert_eq!(
        result.status,
        ExecutionStatus::Cancelled,
        "Expected cancelled run, got {:?}",
        result.status
    );
}

/// Asserts that a node wrote exactly `expected` as its output.
pub fn assert_node_output(result: &ExecutionResult, node_id: &str, expected: &Value) {
    let record = result.context.node_outputs.get(node_id).unwrap_or_else(|| {
        panic!(
            "Expected output for node '{node_id}'. Nodes with output: {:?}",
            result.context.node_outputs.keys().collect::<Vec<_>>()
        )
    });
    assert_eq!(&record.output, expected, "Unexpected output for node '{node_id}'");
}

/// Asserts that a node has no output slot.
pub fn assert_no_node_output(result: &ExecutionResult, node_id: &str) {
    assert!(
        !result.context.node_outputs.contains_key(node_id),
        "Expected no output for node '{node_id}', found {:?}",
        result.context.node_outputs.get(node_id)
    );
}
