//! Turns a raw definition into a validated [`Graph`].

use super::{Edge, Graph, Node, WorkflowDefinition};
use crate::core::NodeType;
use crate::errors::DagValidationError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::warn;

#[derive(Debug, Deserialize)]
struct RawEdge {
    #[serde(default)]
    id: Option<String>,
    source: String,
    target: String,
    #[serde(default)]
    condition: Option<Value>,
}

/// Parses and validates a workflow definition.
///
/// # Errors
///
/// Returns a [`DagValidationError`] when there is not exactly one start node,
/// a node or edge is malformed, an edge references a missing node, or the
/// graph contains a cycle. Unreachable nodes only produce a warning.
pub fn parse(definition: &WorkflowDefinition) -> Result<Graph, DagValidationError> {
    let mut nodes = HashMap::with_capacity(definition.nodes.len());
    let mut node_order = Vec::with_capacity(definition.nodes.len());
    let mut start_node_id: Option<String> = None;
    let mut end_node_ids = Vec::new();

    for (position, raw) in definition.nodes.iter().enumerate() {
        let node = Node::from_value(raw, position)?;
        if nodes.contains_key(&node.id) {
            return Err(DagValidationError::duplicate_node(&node.id));
        }

        match node.node_type() {
            NodeType::Start => {
                if let Some(existing) = &start_node_id {
                    return Err(DagValidationError::start_node(
                        format!("Multiple start nodes found: '{}' and '{}'", existing, node.id),
                        vec![existing.clone(), node.id.clone()],
                    ));
                }
                start_node_id = Some(node.id.clone());
            }
            NodeType::End => end_node_ids.push(node.id.clone()),
            _ => {}
        }

        node_order.push(node.id.clone());
        nodes.insert(node.id.clone(), node);
    }

    let start_node_id = start_node_id
        .ok_or_else(|| DagValidationError::start_node("No start node found", Vec::new()))?;

    let edges = definition
        .edges
        .iter()
        .enumerate()
        .map(|(position, raw)| parse_edge(raw, position))
        .collect::<Result<Vec<_>, _>>()?;

    let mut adjacency: HashMap<String, Vec<String>> = node_order
        .iter()
        .map(|id| (id.clone(), Vec::new()))
        .collect();
    let mut reverse_adjacency = adjacency.clone();
    for edge in &edges {
        adjacency
            .entry(edge.source.clone())
            .or_default()
            .push(edge.target.clone());
        reverse_adjacency
            .entry(edge.target.clone())
            .or_default()
            .push(edge.source.clone());
    }

    let graph = Graph {
        nodes,
        node_order,
        edges,
        start_node_id,
        end_node_ids,
        adjacency,
        reverse_adjacency,
    };

    validate(&graph)?;
    Ok(graph)
}

fn parse_edge(raw: &Value, position: usize) -> Result<Edge, DagValidationError> {
    let label = raw
        .get("id")
        .and_then(Value::as_str)
        .map_or_else(|| format!("#{position}"), String::from);

    let raw: RawEdge = serde_json::from_value(raw.clone())
        .map_err(|e| DagValidationError::edge(&label, e.to_string()))?;

    Ok(Edge {
        id: raw
            .id
            .unwrap_or_else(|| format!("{}->{}", raw.source, raw.target)),
        source: raw.source,
        target: raw.target,
        condition: raw.condition,
    })
}

fn validate(graph: &Graph) -> Result<(), DagValidationError> {
    check_edges(graph)?;
    check_acyclic(graph)?;
    warn_unreachable(graph);
    Ok(())
}

fn check_edges(graph: &Graph) -> Result<(), DagValidationError> {
    for edge in &graph.edges {
        for endpoint in [&edge.source, &edge.target] {
            if !graph.nodes.contains_key(endpoint) {
                return Err(DagValidationError::edge(
                    &edge.id,
                    format!("node '{endpoint}' does not exist"),
                )
                .with_nodes(vec![endpoint.clone()]));
            }
        }
    }
    Ok(())
}

fn check_acyclic(graph: &Graph) -> Result<(), DagValidationError> {
    let mut visited = HashSet::new();
    for id in &graph.node_order {
        if let Some(cycle) = find_cycle(graph, id, &mut visited) {
            return Err(DagValidationError::cycle(cycle));
        }
    }
    Ok(())
}

/// Depth-first search from `root` with an explicit frame stack.
///
/// Each frame is a node and the index of its next successor to visit.
/// `path` mirrors the frames and `on_stack` indexes them.
fn find_cycle<'g>(
    graph: &'g Graph,
    root: &'g str,
    visited: &mut HashSet<&'g str>,
) -> Option<Vec<String>> {
    if !visited.insert(root) {
        return None;
    }

    let mut frames: Vec<(&'g str, usize)> = vec![(root, 0)];
    let mut path: Vec<&'g str> = vec![root];
    let mut on_stack: HashSet<&'g str> = HashSet::from([root]);

    while let Some(frame) = frames.last_mut() {
        let (node, next) = *frame;
        let Some(target) = graph.successors(node).get(next) else {
            frames.pop();
            path.pop();
            on_stack.remove(node);
            continue;
        };
        frame.1 += 1;
        let target = target.as_str();

        if on_stack.contains(target) {
            let start = path.iter().position(|id| *id == target).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(|id| (*id).to_string()).collect();
            cycle.push(target.to_string());
            return Some(cycle);
        }
        if visited.insert(target) {
            frames.push((target, 0));
            path.push(target);
            on_stack.insert(target);
        }
    }
    None
}

fn warn_unreachable(graph: &Graph) {
    for id in &graph.node_order {
        if *id != graph.start_node_id && graph.predecessors(id).is_empty() {
            warn!(node_id = %id, "Node has no incoming edges and will run in the first level");
        }
    }
}
