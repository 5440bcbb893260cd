//! The workflow engine facade.

use super::config::EngineConfig;
use super::registry::ExecutionRegistry;
use super::scheduler::{LevelScheduler, ScheduleReport};
use crate::context::{ContextSnapshot, ExecutionContext, VariableDefinition};
use crate::core::{ExecutionStatus, LogLevel};
use crate::errors::{ExecutionCancelledError, WorkflowError};
use crate::events::{event_types, EventSink, NoOpEventSink};
use crate::executor::{NodeExecutor, SkillInvoker};
use crate::graph::{parse, WorkflowDefinition};
use crate::utils::generate_execution_id;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// A request to run a workflow once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// The workflow being run.
    pub workflow_id: String,
    /// Execution id; generated when absent.
    #[serde(default)]
    pub execution_id: Option<String>,
    /// The run input payload.
    #[serde(default)]
    pub input: Value,
    /// Variable definitions applied to the input.
    #[serde(default)]
    pub variables: Vec<VariableDefinition>,
    /// The graph to run.
    pub definition: WorkflowDefinition,
}

impl ExecutionRequest {
    /// Creates a request with an empty input.
    #[must_use]
    pub fn new(workflow_id: impl Into<String>, definition: WorkflowDefinition) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            definition,
            input: Value::Object(Map::new()),
            ..Self::default()
        }
    }

    /// Sets the execution id.
    #[must_use]
    pub fn with_execution_id(mut self, execution_id: impl Into<String>) -> Self {
        self.execution_id = Some(execution_id.into());
        self
    }

    /// Sets the input payload.
    #[must_use]
    pub fn with_input(mut self, input: Value) -> Self {
        self.input = input;
        self
    }

    /// Sets the variable definitions.
    #[must_use]
    pub fn with_variables(mut self, variables: Vec<VariableDefinition>) -> Self {
        self.variables = variables;
        self
    }
}

/// The outcome of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Execution id.
    pub execution_id: String,
    /// Terminal status.
    pub status: ExecutionStatus,
    /// Outputs of the end nodes that were reached.
    pub output: HashMap<String, Value>,
    /// Why the run did not complete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    /// Full context state at the end of the run.
    pub context: ContextSnapshot,
}

impl ExecutionResult {
    /// Returns true if the run completed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Completed
    }

    /// Converts to a dictionary representation.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if an output cannot be encoded.
    pub fn to_dict(&self) -> Result<Value, WorkflowError> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Parses, validates and runs workflow graphs.
pub struct WorkflowEngine {
    executor: Arc<NodeExecutor>,
    events: Arc<dyn EventSink>,
    config: Arc<EngineConfig>,
    registry: Arc<ExecutionRegistry>,
}

impl WorkflowEngine {
    /// Creates an engine with default configuration and no event sink.
    #[must_use]
    pub fn new(invoker: Arc<dyn SkillInvoker>) -> Self {
        Self {
            executor: Arc::new(NodeExecutor::new(invoker)),
            events: Arc::new(NoOpEventSink),
            config: Arc::new(EngineConfig::default()),
            registry: Arc::new(ExecutionRegistry::new()),
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Shares an execution registry with other engines.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<ExecutionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the execution registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ExecutionRegistry> {
        &self.registry
    }

    /// Runs a workflow to a terminal state.
    ///
    /// Node failures and cancellation are reported through the result's
    /// status, never as `Err`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Validation`] for a definition that is not a
    /// valid DAG and [`WorkflowError::InvalidInput`] for input that does not
    /// satisfy the variable definitions or reuses a live execution id. No
    /// node runs in either case.
    pub async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionResult, WorkflowError> {
        let ExecutionRequest {
            workflow_id,
            execution_id,
            input,
            variables,
            definition,
        } = request;
        let execution_id = execution_id.unwrap_or_else(generate_execution_id);

        let graph = match parse(&definition) {
            Ok(graph) => Arc::new(graph),
            Err(e) => {
                warn!(execution_id = %execution_id, workflow_id = %workflow_id, error = %e, "Workflow rejected");
                return Err(e.into());
            }
        };
        let ctx = Arc::new(ExecutionContext::with_definitions(
            execution_id.clone(),
            workflow_id.clone(),
            input,
            &variables,
        )?);
        let _registration = self.registry.register(ctx.clone())?;

        ctx.start();
        ctx.add_log(
            LogLevel::Info,
            format!("Workflow execution started ({} nodes)", graph.node_count()),
            None,
            None,
        );
        self.events
            .emit(
                event_types::WORKFLOW_STARTED,
                Some(json!({
                    "execution_id": execution_id,
                    "workflow_id": workflow_id,
                    "nodes": graph.node_count(),
                })),
            )
            .await;

        let scheduler = LevelScheduler::new(
            self.executor.clone(),
            self.events.clone(),
            self.config.clone(),
        );
        let (output, error) = match scheduler.run_with_report(graph, ctx.clone()).await {
            Ok(report) => self.conclude(&ctx, report).await,
            Err(e) => {
                error!(execution_id = %execution_id, error = %e, "Workflow aborted");
                ctx.add_log(LogLevel::Error, format!("Workflow aborted: {e}"), None, None);
                ctx.finish(false);
                self.emit_terminal(event_types::WORKFLOW_FAILED, &ctx).await;
                (HashMap::new(), Some(error_value(&e)))
            }
        };

        info!(
            execution_id = %execution_id,
            status = %ctx.status(),
            execution_time = ctx.execution_time(),
            "Workflow execution finished"
        );

        Ok(ExecutionResult {
            execution_id,
            status: ctx.status(),
            output,
            error,
            context: ctx.to_snapshot(),
        })
    }

    /// Requests cancellation of a live execution.
    ///
    /// Returns false if no execution with that id is running.
    pub fn cancel_execution(&self, execution_id: &str, reason: &str) -> bool {
        let found = self.registry.cancel(execution_id, reason);
        if found {
            info!(execution_id, reason, "Cancellation requested");
        }
        found
    }

    async fn conclude(
        &self,
        ctx: &ExecutionContext,
        report: ScheduleReport,
    ) -> (HashMap<String, Value>, Option<Value>) {
        if report.cancelled {
            let reason = ctx.cancel_reason().unwrap_or_else(|| "cancelled".to_string());
            ctx.add_log(
                LogLevel::Warning,
                format!("Workflow execution cancelled: {reason}"),
                None,
                None,
            );
            ctx.mark_cancelled();
            self.emit_terminal(event_types::WORKFLOW_CANCELLED, ctx).await;
            let err = WorkflowError::from(ExecutionCancelledError::new(reason));
            return (report.end_outputs, Some(error_value(&err)));
        }

        if let Some(root) = report.first_root_failure() {
            let failed: Vec<&str> = report.failures.iter().map(|f| f.node_id.as_str()).collect();
            ctx.add_log(
                LogLevel::Error,
                format!("Workflow execution failed: {}", root.error),
                Some(root.node_id.as_str()),
                Some(json!({ "failed_nodes": failed })),
            );
            ctx.finish(false);
            self.emit_terminal(event_types::WORKFLOW_FAILED, ctx).await;
            let error = json!({
                "type": root.error_type,
                "message": root.error,
                "node_id": root.node_id,
                "failed_nodes": failed,
            });
            return (report.end_outputs, Some(error));
        }

        ctx.add_log(LogLevel::Info, "Workflow execution completed", None, None);
        ctx.finish(true);
        self.emit_terminal(event_types::WORKFLOW_COMPLETED, ctx).await;
        (report.end_outputs, None)
    }

    async fn emit_terminal(&self, event_type: &str, ctx: &ExecutionContext) {
        let stats = ctx.statistics();
        self.events
            .emit(
                event_type,
                Some(json!({
                    "execution_id": ctx.execution_id(),
                    "workflow_id": ctx.workflow_id(),
                    "status": ctx.status(),
                    "completed": stats.completed,
                    "failed": stats.failed,
                    "execution_time": ctx.execution_time(),
                })),
            )
            .await;
    }
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("config", &self.config)
            .field("active", &self.registry.len())
            .finish_non_exhaustive()
    }
}

fn error_value(error: &WorkflowError) -> Value {
    Value::Object(error.to_dict().into_iter().collect())
}
