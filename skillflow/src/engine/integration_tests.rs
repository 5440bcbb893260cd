//! End-to-end runs through [`WorkflowEngine`].

use super::*;
use crate::context::VariableDefinition;
use crate::core::ExecutionStatus;
use crate::errors::WorkflowError;
use crate::events::{event_types, CollectingEventSink, EventSink};
use crate::graph::WorkflowDefinition;
use crate::testing::{
    assert_cancelled, assert_completed, assert_failed, assert_no_node_output,
    assert_node_output, FailingSkillInvoker, FlakySkillInvoker, GraphFixture,
    RecordingSkillInvoker, StaticSkillInvoker,
};
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Cancels the run through the registry once `node` completes.
struct CancelAfterNode {
    registry: Arc<ExecutionRegistry>,
    node: &'static str,
    inner: CollectingEventSink,
}

#[async_trait]
impl EventSink for CancelAfterNode {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.try_emit(event_type, data);
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        if event_type == event_types::NODE_COMPLETED {
            if let Some(data) = &data {
                if data["node_id"] == self.node {
                    if let Some(id) = data["execution_id"].as_str() {
                        self.registry.cancel(id, "user requested");
                    }
                }
            }
        }
        self.inner.try_emit(event_type, data);
    }
}

fn request(definition: WorkflowDefinition) -> ExecutionRequest {
    ExecutionRequest::new("wf", definition)
}

#[tokio::test]
async fn test_linear_success_after_retries() {
    let invoker = Arc::new(FlakySkillInvoker::new(2, json!({"value": 42})));
    let sink = Arc::new(CollectingEventSink::new());
    let engine = WorkflowEngine::new(invoker.clone()).with_event_sink(sink.clone());

    let definition = GraphFixture::new()
        .start("start")
        .node(json!({
            "id": "A",
            "type": "skill",
            "config": {"skill_id": "A"},
            "retry_config": {"max_retries": 2, "backoff": "fixed", "initial_delay": 0}
        }))
        .end("end")
        .chain(&["start", "A", "end"])
        .build();

    let result = engine.execute(request(definition)).await.unwrap();

    assert_completed(&result);
    assert_node_output(&result, "A", &json!({"value": 42}));
    assert_eq!(invoker.call_count(), 3);
    assert_eq!(sink.events_of_type(event_types::NODE_RETRYING).len(), 2);
    assert_eq!(result.output.get("end"), Some(&json!({"completed": true})));
    assert!(result.error.is_none());
}

#[tokio::test]
async fn test_failure_propagates_through_diamond() {
    let invoker = Arc::new(FailingSkillInvoker::new(["A"], "A is broken"));
    let sink = Arc::new(CollectingEventSink::new());
    let engine = WorkflowEngine::new(invoker).with_event_sink(sink.clone());

    let result = engine
        .execute(request(GraphFixture::diamond("A", "B", "C").build()))
        .await
        .unwrap();

    assert_failed(&result);
    assert_node_output(&result, "B", &json!({"skill": "B"}));
    assert_no_node_output(&result, "C");
    assert_no_node_output(&result, "end");
    assert!(result.output.is_empty());

    let error = result.error.unwrap();
    assert_eq!(error["node_id"], "A");
    assert_eq!(error["failed_nodes"], json!(["A", "C", "end"]));

    let failed = sink.node_ids_for(event_types::NODE_FAILED);
    assert_eq!(failed, vec!["A", "C", "end"]);
    assert!(!sink
        .node_ids_for(event_types::NODE_STARTED)
        .contains(&"C".to_string()));
    assert_eq!(sink.events_of_type(event_types::WORKFLOW_FAILED).len(), 1);
}

#[tokio::test]
async fn test_condition_first_match_reported() {
    let engine = WorkflowEngine::new(Arc::new(StaticSkillInvoker::new()));
    let definition = GraphFixture::new()
        .start("start")
        .node(json!({
            "id": "check",
            "type": "condition",
            "config": {"conditions": [
                {"id": "big", "type": "comparison", "variable": "$variables.x", "operator": "gt", "value": 5},
                {"type": "always"}
            ]}
        }))
        .end("end")
        .chain(&["start", "check", "end"])
        .build();

    let result = engine
        .execute(
            request(definition)
                .with_input(json!({"x": 10}))
                .with_variables(vec![VariableDefinition::new("x")]),
        )
        .await
        .unwrap();

    assert_completed(&result);
    assert_node_output(&result, "check", &json!({"result": true, "matched_condition": "big"}));
}

#[tokio::test]
async fn test_parallel_results_keep_branch_order() {
    let invoker = Arc::new(RecordingSkillInvoker::new().with_delay(Duration::from_millis(5)));
    let engine = WorkflowEngine::new(invoker.clone());
    let definition = GraphFixture::new()
        .start("start")
        .node(json!({
            "id": "fan",
            "type": "parallel",
            "config": {"branches": ["b0", {"node_id": "b1"}, "b2"]}
        }))
        .skill("b0")
        .skill("b1")
        .skill("b2")
        .end("end")
        .chain(&["start", "fan", "end"])
        .build();

    let result = engine.execute(request(definition)).await.unwrap();

    assert_completed(&result);
    let fan = &result.context.node_outputs["fan"].output;
    let results = fan["parallel_results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    for (i, r) in results.iter().enumerate() {
        assert_eq!(r["branch"], json!(i));
        assert_eq!(r["node_id"], json!(format!("b{i}")));
        assert_eq!(r["result"]["skill"], json!(format!("b{i}")));
    }

    // Branch nodes are graph nodes too and also run at level 0.
    assert_eq!(invoker.call_count(), 6);
    let mut skills = invoker.skills();
    skills.sort();
    assert_eq!(skills, vec!["b0", "b0", "b1", "b1", "b2", "b2"]);
    assert_node_output(&result, "b1", &json!({"skill": "b1", "params": {}}));
}

fn recovering_chain(error_handling: Value) -> WorkflowDefinition {
    GraphFixture::new()
        .start("start")
        .node(json!({
            "id": "A",
            "type": "skill",
            "config": {"skill_id": "A"},
            "error_handling": error_handling
        }))
        .skill("B")
        .skill("F")
        .end("end")
        .chain(&["start", "A", "B", "end"])
        .build()
}

#[tokio::test]
async fn test_continue_on_error_does_not_block_dependents() {
    let invoker = Arc::new(FailingSkillInvoker::new(["A"], "A is broken"));
    let engine = WorkflowEngine::new(invoker);

    let definition = GraphFixture::new()
        .start("start")
        .node(json!({
            "id": "A",
            "type": "skill",
            "config": {"skill_id": "A"},
            "error_handling": {"continue_on_error": true}
        }))
        .skill("B")
        .end("end")
        .chain(&["start", "A", "B", "end"])
        .build();

    let result = engine.execute(request(definition)).await.unwrap();

    assert_completed(&result);
    let a = &result.context.node_outputs["A"].output;
    assert_eq!(a["continued"], json!(true));
    assert!(a["error"].as_str().unwrap().contains("A is broken"));
    assert_node_output(&result, "B", &json!({"skill": "B"}));
    assert_eq!(result.context.statistics.completed, 4);
    assert_eq!(result.context.statistics.failed, 0);
    assert!(result.error.is_none());
}

#[tokio::test]
async fn test_fallback_node_recovers_run() {
    let invoker = Arc::new(FailingSkillInvoker::new(["A"], "A is broken"));
    let engine = WorkflowEngine::new(invoker);

    let result = engine
        .execute(request(recovering_chain(json!({"fallback_node_id": "F"}))))
        .await
        .unwrap();

    assert_completed(&result);
    let a = &result.context.node_outputs["A"].output;
    assert_eq!(a["fallback_result"], json!({"skill": "F"}));
    assert!(a["original_error"].as_str().unwrap().contains("A is broken"));
    assert_node_output(&result, "B", &json!({"skill": "B"}));
    assert_eq!(result.context.statistics.failed, 0);
}

#[tokio::test]
async fn test_failing_fallback_still_completes_node() {
    let invoker = Arc::new(FailingSkillInvoker::new(["A", "F"], "down"));
    let engine = WorkflowEngine::new(invoker);

    let result = engine
        .execute(request(recovering_chain(json!({"fallbackNodeId": "F"}))))
        .await
        .unwrap();

    // F also runs on its own at level 0 and fails there.
    assert_failed(&result);
    let a = &result.context.node_outputs["A"].output;
    assert!(a["fallback_error"].as_str().unwrap().contains("down"));
    assert_node_output(&result, "B", &json!({"skill": "B"}));
    assert_eq!(result.error.unwrap()["node_id"], "F");
}

#[tokio::test]
async fn test_cancel_between_levels() {
    let registry = Arc::new(ExecutionRegistry::new());
    let sink = Arc::new(CancelAfterNode {
        registry: registry.clone(),
        node: "start",
        inner: CollectingEventSink::new(),
    });
    let invoker = Arc::new(RecordingSkillInvoker::new());
    let engine = WorkflowEngine::new(invoker.clone())
        .with_registry(registry.clone())
        .with_event_sink(sink.clone());

    let result = engine
        .execute(request(GraphFixture::linear(&["A", "B"]).build()))
        .await
        .unwrap();

    assert_cancelled(&result);
    assert!(result.context.cancelled);
    assert_eq!(result.context.cancel_reason.as_deref(), Some("user requested"));
    assert!(result.context.node_outputs.contains_key("start"));
    assert_no_node_output(&result, "A");
    assert_eq!(invoker.call_count(), 0);
    assert_eq!(result.context.statistics.failed, 0);
    assert_eq!(sink.inner.node_ids_for(event_types::NODE_STARTED), vec!["start"]);
    assert_eq!(sink.inner.events_of_type(event_types::WORKFLOW_CANCELLED).len(), 1);
    assert_eq!(result.error.unwrap()["type"], "ExecutionCancelledError");
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_cancel_execution_routes_by_id() {
    let engine = Arc::new(WorkflowEngine::new(Arc::new(
        RecordingSkillInvoker::new().with_delay(Duration::from_millis(200)),
    )));
    assert!(!engine.cancel_execution("nope", "user"));

    let runner = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .execute(
                    request(GraphFixture::linear(&["slow", "after"]).build())
                        .with_execution_id("exec-1"),
                )
                .await
        })
    };

    while !engine.registry().contains("exec-1") {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert!(engine.cancel_execution("exec-1", "stop"));

    let result = runner.await.unwrap().unwrap();
    assert_cancelled(&result);
    assert_no_node_output(&result, "after");
    assert!(engine.registry().is_empty());
}

#[tokio::test]
async fn test_invalid_definition_is_rejected() {
    let engine = WorkflowEngine::new(Arc::new(StaticSkillInvoker::new()));
    let cyclic = GraphFixture::new()
        .start("start")
        .skill("A")
        .skill("B")
        .chain(&["start", "A", "B", "A"])
        .build();

    let err = tokio_test::assert_err!(engine.execute(request(cyclic)).await);
    assert!(matches!(err, WorkflowError::Validation(_)));
    assert!(engine.registry().is_empty());
}

#[tokio::test]
async fn test_missing_required_variable_is_rejected() {
    let invoker = Arc::new(RecordingSkillInvoker::new());
    let engine = WorkflowEngine::new(invoker.clone());

    let err = engine
        .execute(
            request(GraphFixture::linear(&["A"]).build())
                .with_variables(vec![VariableDefinition::new("topic").required()]),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, WorkflowError::InvalidInput(_)));
    assert_eq!(invoker.call_count(), 0);
}

#[tokio::test]
async fn test_skill_params_resolve_upstream_outputs() {
    let invoker = Arc::new(RecordingSkillInvoker::new());
    let engine = WorkflowEngine::new(invoker.clone());
    let definition = GraphFixture::new()
        .start("start")
        .skill_with("first", json!({"skill_id": "first", "output_variable": "first_out"}))
        .skill_with(
            "second",
            json!({"skill_slug": "second", "params": {
                "from_var": "$first_out.skill",
                "from_node": "$nodes.first.output.skill",
                "topic": "$input.topic"
            }}),
        )
        .end("end")
        .chain(&["start", "first", "second", "end"])
        .build();

    let result = engine
        .execute(request(definition).with_input(json!({"topic": "rust"})))
        .await
        .unwrap();

    assert_completed(&result);
    assert_eq!(
        invoker.params_for("second"),
        vec![json!({"from_var": "first", "from_node": "first", "topic": "rust"})]
    );
}

#[tokio::test]
async fn test_levels_run_in_order() {
    let invoker = Arc::new(RecordingSkillInvoker::new());
    let engine = WorkflowEngine::new(invoker.clone());
    let definition = GraphFixture::new()
        .start("start")
        .skill("a1")
        .skill("a2")
        .skill("b")
        .skill("c")
        .end("end")
        .edge("start", "a1")
        .edge("start", "a2")
        .edge("a1", "b")
        .edge("a2", "c")
        .edge("b", "c")
        .edge("c", "end")
        .build();

    let result = engine.execute(request(definition)).await.unwrap();
    assert_completed(&result);

    let calls = invoker.skills();
    let pos = |s: &str| calls.iter().position(|c| c == s).unwrap();
    assert!(pos("a1") < pos("b") && pos("a2") < pos("b"));
    assert!(pos("b") < pos("c"));

    let outputs = &result.context.node_outputs;
    assert!(outputs["b"].timestamp >= outputs["a1"].timestamp);
    assert!(outputs["c"].timestamp >= outputs["b"].timestamp);
}

#[tokio::test]
async fn test_fail_fast_config() {
    let invoker = Arc::new(FailingSkillInvoker::new(["A"], "down"));
    let engine = WorkflowEngine::new(invoker)
        .with_config(EngineConfig::new().with_failure_mode(FailureMode::FailFast));

    let definition = GraphFixture::new()
        .start("start")
        .skill("A")
        .skill("B")
        .skill("D")
        .end("end")
        .edge("start", "A")
        .edge("start", "B")
        .edge("B", "D")
        .edge("A", "end")
        .edge("D", "end")
        .build();

    let result = engine.execute(request(definition)).await.unwrap();
    assert_failed(&result);
    assert_node_output(&result, "B", &json!({"skill": "B"}));
    assert_no_node_output(&result, "D");
}

#[tokio::test]
async fn test_result_round_trips_through_context_dict() {
    let engine = WorkflowEngine::new(Arc::new(StaticSkillInvoker::new()));
    let result = engine
        .execute(
            request(GraphFixture::linear(&["A"]).build())
                .with_execution_id("exec-rt")
                .with_input(json!({"q": 1})),
        )
        .await
        .unwrap();

    let dict = result.to_dict().unwrap();
    assert_eq!(dict["execution_id"], "exec-rt");
    assert_eq!(dict["status"], "completed");

    let restored: ExecutionResult = serde_json::from_value(dict).unwrap();
    assert_eq!(restored.status, ExecutionStatus::Completed);
    assert_eq!(restored.context.node_outputs.len(), 3);
    assert_eq!(restored.context.statistics.completed, 3);
}

#[tokio::test]
async fn test_duplicate_live_execution_id_rejected() {
    let engine = Arc::new(WorkflowEngine::new(Arc::new(
        RecordingSkillInvoker::new().with_delay(Duration::from_millis(100)),
    )));
    let first = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .execute(request(GraphFixture::linear(&["A"]).build()).with_execution_id("dup"))
                .await
        })
    };
    while !engine.registry().contains("dup") {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let err = engine
        .execute(request(GraphFixture::linear(&["A"]).build()).with_execution_id("dup"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already running"));

    assert_completed(&first.await.unwrap().unwrap());
}
