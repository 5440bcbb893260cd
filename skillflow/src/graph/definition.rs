//! Raw workflow definitions as supplied by a definition store.

use crate::errors::WorkflowError;
use crate::utils::sha256_hex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A workflow definition: flat node and edge maps, not yet validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Raw node maps.
    #[serde(default)]
    pub nodes: Vec<Value>,
    /// Raw edge maps.
    #[serde(default)]
    pub edges: Vec<Value>,
}

impl WorkflowDefinition {
    /// Creates a definition from node and edge lists.
    #[must_use]
    pub fn new(nodes: Vec<Value>, edges: Vec<Value>) -> Self {
        Self { nodes, edges }
    }

    /// Reads a definition from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the value is not `{nodes, edges}`.
    pub fn from_value(value: Value) -> Result<Self, WorkflowError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Reads a definition from JSON text.
    ///
    /// # Errors
    ///
    /// Returns a serialization error on malformed input.
    pub fn from_json(text: &str) -> Result<Self, WorkflowError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Returns a SHA-256 hex digest of the canonical JSON form.
    ///
    /// Object keys serialize in sorted order, so two definitions that differ
    /// only in key order hash identically. External caches key on this.
    #[must_use]
    pub fn content_hash(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        sha256_hex(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_defaults_missing_lists() {
        let def = WorkflowDefinition::from_value(json!({"nodes": [{"id": "s", "type": "start"}]})).unwrap();
        assert_eq!(def.nodes.len(), 1);
        assert!(def.edges.is_empty());
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(WorkflowDefinition::from_json("[1, 2").is_err());
    }

    #[test]
    fn test_content_hash_ignores_key_order() {
        let a = WorkflowDefinition::new(vec![json!({"id": "s", "type": "start"})], vec![]);
        let b = WorkflowDefinition::from_json(r#"{"edges": [], "nodes": [{"type": "start", "id": "s"}]}"#).unwrap();
        assert_eq!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash().len(), 64);
    }

    #[test]
    fn test_content_hash_changes_with_content() {
        let a = WorkflowDefinition::new(vec![json!({"id": "s", "type": "start"})], vec![]);
        let b = WorkflowDefinition::new(vec![json!({"id": "t", "type": "start"})], vec![]);
        assert_ne!(a.content_hash(), b.content_hash());
    }
}
