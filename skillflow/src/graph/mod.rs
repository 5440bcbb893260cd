//! Workflow graph model and validation.
//!
//! This module provides:
//! - Raw workflow definitions and their content hash
//! - Typed nodes with a closed set of kinds
//! - The parser/validator producing a [`Graph`]
//! - Kahn leveling of the graph for scheduling

mod dag;
mod definition;
mod node;
mod parser;

pub use dag::{Edge, Graph};
pub use definition::WorkflowDefinition;
pub use node::{
    BranchRef, ComparisonOperator, Condition, ConditionConfig, ErrorHandling, Node, NodeKind,
    ParallelConfig, SkillConfig, SkillRef, TransformConfig,
};
pub use parser::parse;
