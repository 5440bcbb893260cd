//! Data transforms for transform nodes.

use crate::context::ExecutionContext;
use crate::core::LogLevel;
use crate::graph::TransformConfig;
use serde_json::{Map, Value};

/// Applies a transform configuration.
///
/// Merge sources that do not resolve to an object are skipped, with a
/// warning in the run log attributed to `node_id`.
#[must_use]
pub fn apply(config: &TransformConfig, ctx: &ExecutionContext, node_id: &str) -> Value {
    match config {
        TransformConfig::Expression { expression } => ctx.resolve_value(expression),
        TransformConfig::Mapping { mapping } => Value::Object(
            mapping
                .iter()
                .map(|(key, source)| (key.clone(), ctx.resolve_value(source)))
                .collect(),
        ),
        TransformConfig::Merge { sources } => {
            let mut merged = Map::new();
            for (index, source) in sources.iter().enumerate() {
                match ctx.resolve_value(source) {
                    Value::Object(map) => merged.extend(map),
                    other => ctx.add_log(
                        LogLevel::Warning,
                        format!("Skipping non-object merge source at index {index}"),
                        Some(node_id),
                        Some(serde_json::json!({ "source": source, "resolved": other })),
                    ),
                }
            }
            Value::Object(merged)
        }
    }
}
