//! Node execution.
//!
//! [`NodeExecutor`] runs a single node body once. Retries, fallbacks and
//! failure accounting wrap it in the engine; here an error is simply
//! returned to the caller.

pub mod condition;
mod skill;
pub mod transform;

pub use skill::SkillInvoker;

#[cfg(test)]
pub use skill::MockSkillInvoker;

use crate::context::ExecutionContext;
use crate::errors::WorkflowError;
use crate::graph::{ConditionConfig, Graph, Node, NodeKind, ParallelConfig, SkillConfig};
use futures::future::{join_all, BoxFuture, FutureExt};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Nesting limit for parallel nodes that branch into other parallel nodes.
const MAX_PARALLEL_DEPTH: usize = 16;

/// Executes node bodies by kind.
#[derive(Clone)]
pub struct NodeExecutor {
    invoker: Arc<dyn SkillInvoker>,
}

impl NodeExecutor {
    /// Creates an executor that runs skill nodes through `invoker`.
    #[must_use]
    pub fn new(invoker: Arc<dyn SkillInvoker>) -> Self {
        Self { invoker }
    }

    /// Returns the skill capability.
    #[must_use]
    pub fn invoker(&self) -> &Arc<dyn SkillInvoker> {
        &self.invoker
    }

    /// Runs one node body.
    ///
    /// `graph` is used to look up the branch nodes of a parallel node.
    ///
    /// # Errors
    ///
    /// Returns the node failure: a missing skill reference, a skill error,
    /// or a parallel node nested too deeply.
    pub fn execute<'a>(
        &'a self,
        node: &'a Node,
        graph: &'a Graph,
        ctx: &'a ExecutionContext,
    ) -> BoxFuture<'a, Result<Value, WorkflowError>> {
        self.execute_nested(node, graph, ctx, 0)
    }

    fn execute_nested<'a>(
        &'a self,
        node: &'a Node,
        graph: &'a Graph,
        ctx: &'a ExecutionContext,
        depth: usize,
    ) -> BoxFuture<'a, Result<Value, WorkflowError>> {
        async move {
            debug!(
                execution_id = ctx.execution_id(),
                node_id = %node.id,
                node_type = %node.node_type(),
                "Executing node"
            );

            match &node.kind {
                NodeKind::Start => Ok(json!({ "started": true, "input": ctx.input() })),
                NodeKind::End => Ok(json!({ "completed": true })),
                NodeKind::Skill(config) => self.execute_skill(node, config, ctx).await,
                NodeKind::Condition(config) => Ok(Self::execute_condition(node, config, ctx)),
                NodeKind::Transform(config) => Ok(transform::apply(config, ctx, &node.id)),
                NodeKind::Parallel(config) => {
                    if depth >= MAX_PARALLEL_DEPTH {
                        return Err(WorkflowError::node(
                            &node.id,
                            format!("parallel nesting exceeds {MAX_PARALLEL_DEPTH} levels"),
                        ));
                    }
                    Ok(self.execute_parallel(node, config, graph, ctx, depth).await)
                }
            }
        }
        .boxed()
    }

    async fn execute_skill(
        &self,
        node: &Node,
        config: &SkillConfig,
        ctx: &ExecutionContext,
    ) -> Result<Value, WorkflowError> {
        let skill = config.skill_ref().ok_or_else(|| {
            WorkflowError::node(&node.id, "skill node requires skill_id or skill_slug")
        })?;
        let params = ctx.resolve_value(&config.params);

        let result = self
            .invoker
            .invoke(&skill, params)
            .await
            .map_err(|e| WorkflowError::skill(skill.as_str(), e))?;

        if let Some(name) = &config.output_variable {
            ctx.set_variable(name.clone(), result.clone());
        }
        Ok(result)
    }

    fn execute_condition(node: &Node, config: &ConditionConfig, ctx: &ExecutionContext) -> Value {
        for (index, cond) in config.conditions.iter().enumerate() {
            match condition::evaluate(cond, ctx) {
                Ok(true) => {
                    let matched = cond.id().cloned().unwrap_or_else(|| json!(index));
                    return json!({ "result": true, "matched_condition": matched });
                }
                Ok(false) => {}
                Err(e) => {
                    debug!(node_id = %node.id, index, error = %e, "Condition treated as false");
                }
            }
        }
        json!({ "result": false })
    }

    async fn execute_parallel(
        &self,
        node: &Node,
        config: &ParallelConfig,
        graph: &Graph,
        ctx: &ExecutionContext,
        depth: usize,
    ) -> Value {
        let branches = config.branches.iter().enumerate().map(|(index, branch)| {
            let branch_id = branch.node_id();
            async move {
                let outcome = if branch_id == node.id {
                    Err(WorkflowError::node(&node.id, "parallel node cannot branch to itself"))
                } else {
                    match graph.node(branch_id) {
                        Some(branch_node) => {
                            self.execute_nested(branch_node, graph, ctx, depth + 1).await
                        }
                        None => Err(WorkflowError::node(
                            &node.id,
                            format!("branch node '{branch_id}' not found"),
                        )),
                    }
                };

                match outcome {
                    Ok(result) => json!({ "branch": index, "node_id": branch_id, "result": result }),
                    Err(e) => {
                        warn!(node_id = %node.id, branch = index, error = %e, "Parallel branch failed");
                        json!({ "branch": index, "node_id": branch_id, "error": e.to_string() })
                    }
                }
            }
        });

        json!({ "parallel_results": join_all(branches).await })
    }
}

impl std::fmt::Debug for NodeExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeExecutor").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{parse, SkillRef, WorkflowDefinition};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn graph(nodes: Value) -> Graph {
        let def = WorkflowDefinition::from_value(json!({ "nodes": nodes, "edges": [] })).unwrap();
        parse(&def).unwrap()
    }

    fn executor(mock: MockSkillInvoker) -> NodeExecutor {
        NodeExecutor::new(Arc::new(mock))
    }

    #[tokio::test]
    async fn test_start_and_end_nodes() {
        let g = graph(json!([{"id": "s", "type": "start"}, {"id": "e", "type": "end"}]));
        let ctx = ExecutionContext::new("e1", "w1", json!({"q": 1}));
        let exec = executor(MockSkillInvoker::new());

        let start = exec.execute(g.node("s").unwrap(), &g, &ctx).await.unwrap();
        assert_eq!(start, json!({"started": true, "input": {"q": 1}}));

        let end = exec.execute(g.node("e").unwrap(), &g, &ctx).await.unwrap();
        assert_eq!(end, json!({"completed": true}));
    }

    #[tokio::test]
    async fn test_skill_node_resolves_params_and_sets_variable() {
        let g = graph(json!([
            {"id": "s", "type": "start"},
            {"id": "k", "type": "skill", "config": {
                "skill_slug": "search",
                "params": {"query": "$input.q", "limit": 3},
                "output_variable": "hits"
            }}
        ]));
        let ctx = ExecutionContext::new("e1", "w1", json!({"q": "rust"}));

        let mut mock = MockSkillInvoker::new();
        mock.expect_invoke()
            .withf(|skill, params| {
                *skill == SkillRef::Slug("search".to_string())
                    && *params == json!({"query": "rust", "limit": 3})
            })
            .times(1)
            .returning(|_, _| Ok(json!({"hits": 2})));

        let out = executor(mock)
            .execute(g.node("k").unwrap(), &g, &ctx)
            .await
            .unwrap();
        assert_eq!(out, json!({"hits": 2}));
        assert_eq!(ctx.get_variable("hits", Value::Null), json!({"hits": 2}));
    }

    #[tokio::test]
    async fn test_skill_node_without_reference_fails() {
        let g = graph(json!([{"id": "s", "type": "start"}, {"id": "k", "type": "skill"}]));
        let ctx = ExecutionContext::new("e1", "w1", json!({}));

        let err = executor(MockSkillInvoker::new())
            .execute(g.node("k").unwrap(), &g, &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("skill_id or skill_slug"));
    }

    #[tokio::test]
    async fn test_skill_error_is_wrapped() {
        let g = graph(json!([
            {"id": "s", "type": "start"},
            {"id": "k", "type": "skill", "config": {"skill_id": "sk-1"}}
        ]));
        let ctx = ExecutionContext::new("e1", "w1", json!({}));
        let mut mock = MockSkillInvoker::new();
        mock.expect_invoke()
            .returning(|_, _| Err(anyhow::anyhow!("upstream timeout")));

        let err = executor(mock)
            .execute(g.node("k").unwrap(), &g, &ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "SkillError");
        assert!(err.to_string().contains("upstream timeout"));
    }

    #[tokio::test]
    async fn test_condition_first_match_wins() {
        let g = graph(json!([
            {"id": "s", "type": "start"},
            {"id": "c", "type": "condition", "config": {"conditions": [
                {"id": "big", "type": "comparison", "variable": "$variables.x", "operator": "gt", "value": 5},
                {"type": "always"}
            ]}}
        ]));
        let ctx = ExecutionContext::new("e1", "w1", json!({}));
        ctx.set_variable("x", json!(10));

        let exec = executor(MockSkillInvoker::new());
        let out = exec.execute(g.node("c").unwrap(), &g, &ctx).await.unwrap();
        assert_eq!(out, json!({"result": true, "matched_condition": "big"}));

        ctx.set_variable("x", json!(1));
        let out = exec.execute(g.node("c").unwrap(), &g, &ctx).await.unwrap();
        assert_eq!(out, json!({"result": true, "matched_condition": 1}));
    }

    #[tokio::test]
    async fn test_condition_errors_count_as_false() {
        let g = graph(json!([
            {"id": "s", "type": "start"},
            {"id": "c", "type": "condition", "config": {"conditions": [
                {"type": "comparison", "variable": "$input.name", "operator": "gt", "value": 5}
            ]}}
        ]));
        let ctx = ExecutionContext::new("e1", "w1", json!({"name": "ada"}));

        let out = executor(MockSkillInvoker::new())
            .execute(g.node("c").unwrap(), &g, &ctx)
            .await
            .unwrap();
        assert_eq!(out, json!({"result": false}));
    }

    #[tokio::test]
    async fn test_parallel_preserves_branch_order() {
        let g = graph(json!([
            {"id": "s", "type": "start"},
            {"id": "p", "type": "parallel", "config": {"branches": ["slow", {"node_id": "fast"}, "mid"]}},
            {"id": "slow", "type": "skill", "config": {"skill_id": "slow"}},
            {"id": "fast", "type": "skill", "config": {"skill_id": "fast"}},
            {"id": "mid", "type": "skill", "config": {"skill_id": "mid"}}
        ]));
        let ctx = ExecutionContext::new("e1", "w1", json!({}));

        struct Timed;
        #[async_trait::async_trait]
        impl SkillInvoker for Timed {
            async fn invoke(&self, skill: &SkillRef, _params: Value) -> anyhow::Result<Value> {
                let ms = match skill.as_str() {
                    "slow" => 40,
                    "mid" => 20,
                    _ => 0,
                };
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(json!(skill.as_str()))
            }
        }

        let out = NodeExecutor::new(Arc::new(Timed))
            .execute(g.node("p").unwrap(), &g, &ctx)
            .await
            .unwrap();

        let results = out["parallel_results"].as_array().unwrap();
        assert_eq!(results.len(), 3);
        for (i, (id, r)) in ["slow", "fast", "mid"].iter().zip(results).enumerate() {
            assert_eq!(r["branch"], json!(i));
            assert_eq!(r["node_id"], json!(id));
            assert_eq!(r["result"], json!(id));
        }
    }

    #[tokio::test]
    async fn test_parallel_branch_errors_are_captured() {
        let g = graph(json!([
            {"id": "s", "type": "start"},
            {"id": "p", "type": "parallel", "config": {"branches": ["ok", "missing", "p"]}},
            {"id": "ok", "type": "end"}
        ]));
        let ctx = ExecutionContext::new("e1", "w1", json!({}));

        let out = executor(MockSkillInvoker::new())
            .execute(g.node("p").unwrap(), &g, &ctx)
            .await
            .unwrap();

        let results = out["parallel_results"].as_array().unwrap();
        assert_eq!(results[0]["result"], json!({"completed": true}));
        assert!(results[1]["error"].as_str().unwrap().contains("not found"));
        assert!(results[2]["error"].as_str().unwrap().contains("itself"));
    }
}
