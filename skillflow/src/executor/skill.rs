//! The skill invocation capability.

use crate::graph::SkillRef;
use async_trait::async_trait;
use serde_json::Value;

/// Runs a skill body on behalf of a skill node.
///
/// Skill bodies execute outside the engine; implementations adapt whatever
/// runtime hosts them. An `Err` is handed to the node's retry policy like any
/// other node failure.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SkillInvoker: Send + Sync {
    /// Invokes `skill` with already-resolved parameters.
    async fn invoke(&self, skill: &SkillRef, params: Value) -> anyhow::Result<Value>;
}
