//! Per-run execution state.
//!
//! This module provides:
//! - The `$root.path` reference grammar
//! - Variable definitions and input seeding
//! - The shared mutable [`ExecutionContext`]
//! - Serializable snapshots for the final report

mod execution;
mod reference;
mod snapshot;
mod variables;

pub use execution::ExecutionContext;
pub use reference::{lookup, Reference, ReferenceRoot};
pub use snapshot::{ContextSnapshot, ExecutionStatistics, LogEntry, NodeOutputRecord};
pub use variables::{seed_variables, VariableDefinition};
