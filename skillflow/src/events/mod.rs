//! Event sinks for run observability.
//!
//! The engine reports lifecycle transitions through an injected
//! [`EventSink`]. Event payloads are JSON objects carrying at least
//! `execution_id`, plus `node_id` for node events.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Event type names emitted by the engine.
pub mod event_types {
    /// A run passed validation and began scheduling.
    pub const WORKFLOW_STARTED: &str = "workflow.started";
    /// A run finished with every node resolved.
    pub const WORKFLOW_COMPLETED: &str = "workflow.completed";
    /// A run finished with at least one hard node failure.
    pub const WORKFLOW_FAILED: &str = "workflow.failed";
    /// A run stopped because cancellation was requested.
    pub const WORKFLOW_CANCELLED: &str = "workflow.cancelled";
    /// A level is about to be dispatched.
    pub const LEVEL_STARTED: &str = "level.started";
    /// A node was dispatched.
    pub const NODE_STARTED: &str = "node.started";
    /// A node resolved successfully.
    pub const NODE_COMPLETED: &str = "node.completed";
    /// A node failed, directly or by propagation.
    pub const NODE_FAILED: &str = "node.failed";
    /// A node was already resolved and was not dispatched again.
    pub const NODE_SKIPPED: &str = "node.skipped";
    /// A node attempt failed and another will follow.
    pub const NODE_RETRYING: &str = "node.retrying";
}
