//! Workflow definition fixtures.

use serde_json::{json, Value};

use crate::graph::{parse, Graph, WorkflowDefinition};

/// Builds raw workflow definitions node by node.
#[derive(Debug, Clone, Default)]
pub struct GraphFixture {
    nodes: Vec<Value>,
    edges: Vec<Value>,
}

impl GraphFixture {
    /// Creates an empty fixture.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a raw node.
    #[must_use]
    pub fn node(mut self, node: Value) -> Self {
        self.nodes.push(node);
        self
    }

    /// Adds a start node.
    #[must_use]
    pub fn start(self, id: &str) -> Self {
        self.node(json!({"id": id, "type": "start"}))
    }

    /// Adds an end node.
    #[must_use]
    pub fn end(self, id: &str) -> Self {
        self.node(json!({"id": id, "type": "end"}))
    }

    /// Adds a skill node invoking the skill with the same id.
    #[must_use]
    pub fn skill(self, id: &str) -> Self {
        self.node(json!({"id": id, "type": "skill", "config": {"skill_id": id}}))
    }

    /// Adds a skill node with explicit configuration.
    #[must_use]
    pub fn skill_with(self, id: &str, config: Value) -> Self {
        self.node(json!({"id": id, "type": "skill", "config": config}))
    }

    /// Adds an edge.
    #[must_use]
    pub fn edge(mut self, source: &str, target: &str) -> Self {
        self.edges.push(json!({"source": source, "target": target}));
        self
    }

    /// Adds edges forming a chain through `ids`.
    #[must_use]
    pub fn chain(mut self, ids: &[&str]) -> Self {
        for pair in ids.windows(2) {
            self = self.edge(pair[0], pair[1]);
        }
        self
    }

    /// Returns the raw definition.
    #[must_use]
    pub fn build(self) -> WorkflowDefinition {
        WorkflowDefinition::new(self.nodes, self.edges)
    }

    /// Parses the definition, panicking if it is invalid.
    #[must_use]
    pub fn graph(self) -> Graph {
        match parse(&self.build()) {
            Ok(graph) => graph,
            Err(e) => panic!("fixture graph is invalid: {e}"),
        }
    }

    /// `start -> skills... -> end`.
    #[must_use]
    pub fn linear(skills: &[&str]) -> Self {
        let mut ids = vec!["start"];
        ids.extend_from_slice(skills);
        ids.push("end");
        skills
            .iter()
            .fold(Self::new().start("start"), |f, id| f.skill(id))
            .end("end")
            .chain(&ids)
    }

    /// `start -> {a, b} -> c -> end` with skill nodes a, b and c.
    #[must_use]
    pub fn diamond(a: &str, b: &str, c: &str) -> Self {
        Self::new()
            .start("start")
            .skill(a)
            .skill(b)
            .skill(c)
            .end("end")
            .edge("start", a)
            .edge("start", b)
            .edge(a, c)
            .edge(b, c)
            .edge(c, "end")
    }
}
