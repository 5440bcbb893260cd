//! The validated workflow DAG.
//!
//! Nodes live in an arena keyed by id; edges and both adjacency indexes refer
//! to nodes by id only.

use super::Node;
use std::collections::HashMap;

/// A directed edge between two nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// Edge id (synthesised as `source->target` when absent).
    pub id: String,
    /// Source node id.
    pub source: String,
    /// Target node id.
    pub target: String,
    /// Informational branch label; branch selection happens in condition config.
    pub condition: Option<serde_json::Value>,
}

/// A parsed and validated workflow graph.
#[derive(Debug, Clone)]
pub struct Graph {
    pub(crate) nodes: HashMap<String, Node>,
    pub(crate) node_order: Vec<String>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) start_node_id: String,
    pub(crate) end_node_ids: Vec<String>,
    pub(crate) adjacency: HashMap<String, Vec<String>>,
    pub(crate) reverse_adjacency: HashMap<String, Vec<String>>,
}

impl Graph {
    /// Returns a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Returns true if the graph has a node with this id.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Returns nodes in definition order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.node_order.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns edges in definition order.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Returns the start node id.
    #[must_use]
    pub fn start_node_id(&self) -> &str {
        &self.start_node_id
    }

    /// Returns end node ids in definition order.
    #[must_use]
    pub fn end_node_ids(&self) -> &[String] {
        &self.end_node_ids
    }

    /// Returns the direct successors of a node.
    #[must_use]
    pub fn successors(&self, id: &str) -> &[String] {
        self.adjacency.get(id).map_or(&[], Vec::as_slice)
    }

    /// Returns the direct predecessors of a node.
    #[must_use]
    pub fn predecessors(&self, id: &str) -> &[String] {
        self.reverse_adjacency.get(id).map_or(&[], Vec::as_slice)
    }

    /// Groups nodes into topological levels using Kahn's algorithm.
    ///
    /// Every node's predecessors sit in strictly earlier levels. Within a
    /// level, nodes keep the order in which they became ready.
    #[must_use]
    pub fn levels(&self) -> Vec<Vec<String>> {
        let mut in_degree: HashMap<&str, usize> = self
            .node_order
            .iter()
            .map(|id| (id.as_str(), 0))
            .collect();
        for edge in &self.edges {
            if let Some(count) = in_degree.get_mut(edge.target.as_str()) {
                *count += 1;
            }
        }

        let mut current: Vec<&str> = self
            .node_order
            .iter()
            .map(String::as_str)
            .filter(|id| in_degree.get(id) == Some(&0))
            .collect();

        let mut levels = Vec::new();
        while !current.is_empty() {
            let mut next = Vec::new();
            for id in &current {
                for target in self.successors(id) {
                    if let Some(count) = in_degree.get_mut(target.as_str()) {
                        *count = count.saturating_sub(1);
                        if *count == 0 {
                            next.push(target.as_str());
                        }
                    }
                }
            }
            levels.push(current.iter().map(|id| (*id).to_string()).collect());
            current = next;
        }

        levels
    }

    /// Returns the level index of every node.
    #[must_use]
    pub fn level_index(&self) -> HashMap<String, usize> {
        self.levels()
            .into_iter()
            .enumerate()
            .flat_map(|(level, ids)| ids.into_iter().map(move |id| (id, level)))
            .collect()
    }
}
