//! Core domain enums for skillflow.
//!
//! This module contains the small shared vocabulary used throughout the
//! engine: node types, run status and log levels.

mod status;

pub use status::{ExecutionStatus, LogLevel, NodeType};
