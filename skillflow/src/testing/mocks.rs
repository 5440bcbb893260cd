//! Skill invokers for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::executor::SkillInvoker;
use crate::graph::SkillRef;

/// Returns a fixed result per skill, or a default for unknown skills.
#[derive(Debug, Default)]
pub struct StaticSkillInvoker {
    results: HashMap<String, Value>,
    default: Value,
}

impl StaticSkillInvoker {
    /// Creates an invoker that echoes `{"skill": <ref>}` for every skill.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the result of one skill.
    #[must_use]
    pub fn with_result(mut self, skill: impl Into<String>, result: Value) -> Self {
        self.results.insert(skill.into(), result);
        self
    }

    /// Sets the result of skills without a configured one.
    #[must_use]
    pub fn with_default(mut self, result: Value) -> Self {
        self.default = result;
        self
    }
}

#[async_trait]
impl SkillInvoker for StaticSkillInvoker {
    async fn invoke(&self, skill: &SkillRef, _params: Value) -> anyhow::Result<Value> {
        if let Some(result) = self.results.get(skill.as_str()) {
            return Ok(result.clone());
        }
        if self.default.is_null() {
            return Ok(serde_json::json!({ "skill": skill.as_str() }));
        }
        Ok(self.default.clone())
    }
}

/// Fails the first `failures` calls, then succeeds.
#[derive(Debug)]
pub struct FlakySkillInvoker {
    failures: u32,
    calls: AtomicU32,
    result: Value,
}

impl FlakySkillInvoker {
    /// Creates an invoker that fails `failures` times before returning `result`.
    #[must_use]
    pub fn new(failures: u32, result: Value) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
            result,
        }
    }

    /// Number of invocations so far.
    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SkillInvoker for FlakySkillInvoker {
    async fn invoke(&self, skill: &SkillRef, _params: Value) -> anyhow::Result<Value> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            anyhow::bail!("{skill} failed on attempt {call}");
        }
        Ok(self.result.clone())
    }
}

/// Fails the listed skills and succeeds for all others.
#[derive(Debug, Default)]
pub struct FailingSkillInvoker {
    failing: Vec<String>,
    message: String,
}

impl FailingSkillInvoker {
    /// Creates an invoker failing the given skills with `message`.
    #[must_use]
    pub fn new<I, S>(failing: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            failing: failing.into_iter().map(Into::into).collect(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl SkillInvoker for FailingSkillInvoker {
    async fn invoke(&self, skill: &SkillRef, _params: Value) -> anyhow::Result<Value> {
        if self.failing.iter().any(|s| s == skill.as_str()) {
            anyhow::bail!("{}", self.message);
        }
        Ok(serde_json::json!({ "skill": skill.as_str() }))
    }
}

/// Records every invocation and optionally delays before answering.
#[derive(Debug, Default)]
pub struct RecordingSkillInvoker {
    calls: Mutex<Vec<(String, Value)>>,
    delay: Option<Duration>,
}

impl RecordingSkillInvoker {
    /// Creates a recording invoker with no delay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays each invocation.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Skill names in call order.
    #[must_use]
    pub fn skills(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(s, _)| s.clone()).collect()
    }

    /// Parameters passed to the given skill, per call.
    #[must_use]
    pub fn params_for(&self, skill: &str) -> Vec<Value> {
        self.calls
            .lock()
            .iter()
            .filter(|(s, _)| s == skill)
            .map(|(_, p)| p.clone())
            .collect()
    }

    /// Number of invocations so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl SkillInvoker for RecordingSkillInvoker {
    async fn invoke(&self, skill: &SkillRef, params: Value) -> anyhow::Result<Value> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.calls
            .lock()
            .push((skill.as_str().to_string(), params.clone()));
        Ok(serde_json::json!({ "skill": skill.as_str(), "params": params }))
    }
}
