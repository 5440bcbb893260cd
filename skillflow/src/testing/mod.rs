//! Testing utilities for skillflow workflows.
//!
//! This module provides:
//! - Skill invokers with scripted behavior
//! - A workflow definition builder
//! - Assertions over execution results

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_cancelled, assert_completed, assert_failed, assert_no_node_output, assert_node_output,
};
pub use fixtures::GraphFixture;
pub use mocks::{
    FailingSkillInvoker, FlakySkillInvoker, RecordingSkillInvoker, StaticSkillInvoker,
};
