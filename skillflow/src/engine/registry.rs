//! Registry of live executions, used to route cancellation requests.

use crate::context::ExecutionContext;
use crate::errors::WorkflowError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Live execution contexts keyed by execution id.
///
/// A context is present from the moment its run starts until the run
/// finishes, however it finishes.
#[derive(Debug, Default)]
pub struct ExecutionRegistry {
    active: DashMap<String, Arc<ExecutionContext>>,
}

impl ExecutionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a context until the returned guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::InvalidInput`] if a run with the same
    /// execution id is already active.
    pub fn register(&self, ctx: Arc<ExecutionContext>) -> Result<Registration<'_>, WorkflowError> {
        let execution_id = ctx.execution_id().to_string();
        match self.active.entry(execution_id.clone()) {
            Entry::Occupied(_) => Err(WorkflowError::InvalidInput(format!(
                "execution '{execution_id}' is already running"
            ))),
            Entry::Vacant(slot) => {
                slot.insert(ctx);
                debug!(execution_id = %execution_id, "Registered execution");
                Ok(Registration {
                    registry: self,
                    execution_id,
                })
            }
        }
    }

    /// Removes a context, returning it if it was present.
    pub fn unregister(&self, execution_id: &str) -> Option<Arc<ExecutionContext>> {
        let removed = self.active.remove(execution_id).map(|(_, ctx)| ctx);
        if removed.is_some() {
            debug!(execution_id, "Unregistered execution");
        }
        removed
    }

    /// Returns the live context for an execution.
    #[must_use]
    pub fn get(&self, execution_id: &str) -> Option<Arc<ExecutionContext>> {
        self.active.get(execution_id).map(|entry| entry.value().clone())
    }

    /// Requests cancellation of a live execution.
    ///
    /// Returns false if no such execution is active.
    pub fn cancel(&self, execution_id: &str, reason: &str) -> bool {
        match self.get(execution_id) {
            Some(ctx) => {
                ctx.request_cancel(reason);
                true
            }
            None => false,
        }
    }

    /// Returns true if the execution is active.
    #[must_use]
    pub fn contains(&self, execution_id: &str) -> bool {
        self.active.contains_key(execution_id)
    }

    /// Returns the ids of all active executions.
    #[must_use]
    pub fn execution_ids(&self) -> Vec<String> {
        self.active.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Returns the number of active executions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Returns true if no execution is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

/// Keeps an execution registered; unregisters it on drop.
#[derive(Debug)]
pub struct Registration<'a> {
    registry: &'a ExecutionRegistry,
    execution_id: String,
}

impl Registration<'_> {
    /// Returns the registered execution id.
    #[must_use]
    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.registry.unregister(&self.execution_id);
    }
}
