//! # Skillflow
//!
//! A workflow execution engine for graphs of skills.
//!
//! A workflow is a directed acyclic graph of typed nodes. Skillflow provides:
//!
//! - **Validation**: exactly one start node, resolvable edges, no cycles
//! - **Level scheduling**: Kahn levels run one after another, nodes within a
//!   level run concurrently up to a configurable bound
//! - **Node kinds**: start, end, skill, condition, transform and parallel
//! - **Retry and recovery**: backoff with jitter, fallback nodes and
//!   continue-on-error
//! - **Cancellation**: cooperative, observed between levels and attempts
//! - **Observability**: structured `tracing` logs and an injectable event sink
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use skillflow::prelude::*;
//!
//! let engine = WorkflowEngine::new(Arc::new(MySkills::default()));
//! let definition = WorkflowDefinition::from_json(text)?;
//!
//! let result = engine
//!     .execute(ExecutionRequest::new("daily-report", definition).with_input(input))
//!     .await?;
//! assert_eq!(result.status, ExecutionStatus::Completed);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod context;
pub mod core;
pub mod engine;
pub mod errors;
pub mod events;
pub mod executor;
pub mod graph;
pub mod observability;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::context::{ContextSnapshot, ExecutionContext, VariableDefinition};
    pub use crate::core::{ExecutionStatus, LogLevel, NodeType};
    pub use crate::engine::{
        BackoffStrategy, EngineConfig, ExecutionRegistry, ExecutionRequest, ExecutionResult,
        FailureMode, JitterStrategy, RetryConfig, WorkflowEngine,
    };
    pub use crate::errors::{
        DagValidationError, ExecutionCancelledError, NodeExecutionError, OutputConflictError,
        WorkflowError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::executor::{NodeExecutor, SkillInvoker};
    pub use crate::graph::{parse, Graph, Node, NodeKind, SkillRef, WorkflowDefinition};
    pub use crate::observability::{init_tracing, TracingOptions};
    pub use crate::utils::{generate_execution_id, iso_timestamp, Timestamp};
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;
    use crate::testing::{GraphFixture, StaticSkillInvoker};
    use std::sync::Arc;

    #[tokio::test]
    async fn prelude_runs_a_workflow() {
        let engine = WorkflowEngine::new(Arc::new(StaticSkillInvoker::new()));
        let request = ExecutionRequest::new("wf", GraphFixture::linear(&["a"]).build());
        let result = engine.execute(request).await.unwrap();
        assert_eq!(result.status, ExecutionStatus::Completed);
    }
}
