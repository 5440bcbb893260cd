//! Workflow execution: retry policy, failure handling, level scheduling and
//! the engine facade.

mod config;
#[allow(clippy::module_inception)]
mod engine;
mod failure;
mod registry;
mod retry;
mod scheduler;

#[cfg(test)]
mod integration_tests;

pub use config::{EngineConfig, ENV_FAILURE_MODE, ENV_MAX_CONCURRENT_NODES};
pub use engine::{ExecutionRequest, ExecutionResult, WorkflowEngine};
pub use failure::{FailureCollector, FailureMode, FailureRecord};
pub use registry::{ExecutionRegistry, Registration};
pub use retry::{BackoffStrategy, JitterStrategy, RetryConfig, RetryPolicy};
pub use scheduler::{LevelScheduler, ScheduleReport};
