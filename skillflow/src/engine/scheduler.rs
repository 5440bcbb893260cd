//! Level-by-level DAG scheduling.
//!
//! The graph is split into Kahn levels. Each level is dispatched as a batch
//! of spawned tasks and fully joined before the next level starts, so a node
//! never runs before all of its predecessors have resolved.

use super::config::EngineConfig;
use super::failure::{FailureCollector, FailureRecord};
use super::retry::RetryPolicy;
use crate::context::ExecutionContext;
use crate::core::LogLevel;
use crate::errors::WorkflowError;
use crate::events::{event_types, EventSink};
use crate::executor::NodeExecutor;
use crate::graph::Graph;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// What a scheduling pass produced.
#[derive(Debug, Default)]
pub struct ScheduleReport {
    /// Outputs of end nodes that were reached.
    pub end_outputs: HashMap<String, Value>,
    /// Hard failures, direct and propagated, in record order.
    pub failures: Vec<FailureRecord>,
    /// Whether scheduling stopped because of cancellation.
    pub cancelled: bool,
    /// Number of levels that were dispatched.
    pub levels_run: usize,
}

impl ScheduleReport {
    /// Returns true if any node failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// The first failure of a node that actually ran.
    #[must_use]
    pub fn first_root_failure(&self) -> Option<&FailureRecord> {
        self.failures.iter().find(|f| !f.is_propagated())
    }
}

/// Outcome of one spawned node task.
struct NodeRun {
    node_id: String,
    result: Result<Value, WorkflowError>,
    duration_ms: f64,
}

/// Runs a parsed graph level by level.
#[derive(Clone)]
pub struct LevelScheduler {
    executor: Arc<NodeExecutor>,
    events: Arc<dyn EventSink>,
    config: Arc<EngineConfig>,
}

impl LevelScheduler {
    /// Creates a scheduler.
    #[must_use]
    pub fn new(
        executor: Arc<NodeExecutor>,
        events: Arc<dyn EventSink>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            executor,
            events,
            config,
        }
    }

    /// Runs every level and returns the outputs of the end nodes reached.
    ///
    /// # Errors
    ///
    /// Returns an error only for engine faults such as a node output slot
    /// being written twice. Node failures are recorded on the context.
    pub async fn run(
        &self,
        graph: Arc<Graph>,
        ctx: Arc<ExecutionContext>,
    ) -> Result<HashMap<String, Value>, WorkflowError> {
        Ok(self.run_with_report(graph, ctx).await?.end_outputs)
    }

    /// Runs every level and reports failures and cancellation as well.
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    pub async fn run_with_report(
        &self,
        graph: Arc<Graph>,
        ctx: Arc<ExecutionContext>,
    ) -> Result<ScheduleReport, WorkflowError> {
        let levels = graph.levels();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_nodes.max(1)));
        let mut collector = FailureCollector::new(self.config.failure_mode);
        let mut report = ScheduleReport::default();

        ctx.reset_statistics(graph.node_count());
        debug!(
            execution_id = ctx.execution_id(),
            levels = levels.len(),
            nodes = graph.node_count(),
            "Scheduling graph"
        );

        for (index, level) in levels.iter().enumerate() {
            if ctx.is_cancelled() {
                info!(
                    execution_id = ctx.execution_id(),
                    level = index,
                    "Cancellation observed, stopping before level"
                );
                report.cancelled = true;
                break;
            }
            if collector.should_stop() {
                warn!(
                    execution_id = ctx.execution_id(),
                    level = index,
                    "Stopping after failure (fail_fast)"
                );
                break;
            }

            self.events
                .emit(
                    event_types::LEVEL_STARTED,
                    Some(json!({
                        "execution_id": ctx.execution_id(),
                        "level": index,
                        "nodes": level,
                    })),
                )
                .await;

            let mut tasks = FuturesUnordered::new();
            for node_id in level {
                if collector.is_resolved(node_id) || ctx.has_node_output(node_id) {
                    collector.record_completion(node_id);
                    ctx.record_completed();
                    self.emit_node(event_types::NODE_SKIPPED, &ctx, node_id, json!({}))
                        .await;
                    continue;
                }

                if let Some(pred) = collector.failed_predecessor(graph.predecessors(node_id)) {
                    let record = FailureRecord::propagated(node_id.clone(), pred);
                    ctx.add_log(
                        LogLevel::Error,
                        record.error.clone(),
                        Some(node_id.as_str()),
                        None,
                    );
                    ctx.record_failed();
                    self.emit_node(
                        event_types::NODE_FAILED,
                        &ctx,
                        node_id,
                        json!({ "error": record.error, "caused_by": pred }),
                    )
                    .await;
                    collector.record_failure(record);
                    continue;
                }

                ctx.set_current_node(node_id.clone());
                self.emit_node(event_types::NODE_STARTED, &ctx, node_id, json!({}))
                    .await;
                tasks.push(self.spawn_node(
                    node_id.clone(),
                    graph.clone(),
                    ctx.clone(),
                    semaphore.clone(),
                ));
            }

            while let Some(run) = tasks.next().await {
                if run.result.as_ref().is_err_and(WorkflowError::is_cancelled) {
                    report.cancelled = true;
                }
                self.resolve(run, &ctx, &mut collector).await?;
            }
            report.levels_run += 1;
        }

        for end_id in graph.end_node_ids() {
            if let Some(output) = ctx.get_node_output(end_id) {
                report.end_outputs.insert(end_id.clone(), output);
            }
        }
        report.failures = collector.failures().to_vec();
        Ok(report)
    }

    /// Spawns a node under its retry policy, bounded by the semaphore.
    async fn spawn_node(
        &self,
        node_id: String,
        graph: Arc<Graph>,
        ctx: Arc<ExecutionContext>,
        semaphore: Arc<Semaphore>,
    ) -> NodeRun {
        let executor = self.executor.clone();
        let events = self.events.clone();
        let config = self.config.clone();
        let task_node_id = node_id.clone();
        let started = Instant::now();

        let handle = tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| WorkflowError::Internal(format!("semaphore closed: {e}")))?;
            let node = graph.node(&task_node_id).ok_or_else(|| {
                WorkflowError::Internal(format!("node '{task_node_id}' missing from graph"))
            })?;
            RetryPolicy::new(&executor, events.as_ref(), &config.default_retry)
                .run(node, &graph, &ctx)
                .await
        });

        let result = handle
            .await
            .unwrap_or_else(|e| Err(WorkflowError::node(&node_id, format!("task failed: {e}"))));

        NodeRun {
            node_id,
            result,
            duration_ms: started.elapsed().as_secs_f64() * 1000.0,
        }
    }

    async fn resolve(
        &self,
        run: NodeRun,
        ctx: &ExecutionContext,
        collector: &mut FailureCollector,
    ) -> Result<(), WorkflowError> {
        let NodeRun {
            node_id,
            result,
            duration_ms,
        } = run;

        match result {
            Ok(output) => {
                let metadata = self
                    .config
                    .log_node_outputs
                    .then(|| json!({ "output": output }));
                ctx.set_node_output(node_id.clone(), output)?;
                collector.record_completion(&node_id);
                ctx.record_completed();
                ctx.add_log(LogLevel::Info, "Node completed", Some(node_id.as_str()), metadata);
                self.emit_node(
                    event_types::NODE_COMPLETED,
                    ctx,
                    &node_id,
                    json!({ "duration_ms": duration_ms }),
                )
                .await;
            }
            Err(e) if e.is_cancelled() => {
                ctx.add_log(
                    LogLevel::Info,
                    "Node not finished: execution cancelled",
                    Some(node_id.as_str()),
                    None,
                );
            }
            Err(e) => {
                let message = e.to_string();
                if let Err(conflict) = ctx.set_node_output(node_id.clone(), json!({ "error": message })) {
                    warn!(node_id = %node_id, error = %conflict, "Failed node already had an output");
                }
                ctx.record_failed();
                ctx.add_log(
                    LogLevel::Error,
                    format!("Node failed: {message}"),
                    Some(node_id.as_str()),
                    Some(json!({ "error_type": e.kind() })),
                );
                self.emit_node(
                    event_types::NODE_FAILED,
                    ctx,
                    &node_id,
                    json!({ "error": message, "duration_ms": duration_ms }),
                )
                .await;
                collector.record_failure(FailureRecord::new(node_id, message, e.kind()));
            }
        }
        Ok(())
    }

    async fn emit_node(&self, event_type: &str, ctx: &ExecutionContext, node_id: &str, extra: Value) {
        let mut data = json!({
            "execution_id": ctx.execution_id(),
            "node_id": node_id,
        });
        if let (Some(target), Value::Object(extra)) = (data.as_object_mut(), extra) {
            target.extend(extra);
        }
        self.events.emit(event_type, Some(data)).await;
    }
}

impl std::fmt::Debug for LevelScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LevelScheduler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
