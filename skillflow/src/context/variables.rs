//! Workflow variable definitions and input seeding.

use crate::errors::WorkflowError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A declared workflow variable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableDefinition {
    /// Variable name.
    pub name: String,
    /// Declared type, informational only.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub var_type: Option<String>,
    /// Value used when the input does not provide one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Whether the run must provide a value (directly or via the default).
    #[serde(default)]
    pub required: bool,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl VariableDefinition {
    /// Creates a definition with only a name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Marks the variable as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Parses definitions given either as a list or as a `name -> definition` map.
    ///
    /// # Errors
    ///
    /// Returns a serialization error when an entry does not fit.
    pub fn parse_all(value: &Value) -> Result<Vec<Self>, WorkflowError> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Object(map) => map
                .iter()
                .map(|(name, entry)| {
                    let mut entry = if entry.is_object() {
                        entry.clone()
                    } else {
                        serde_json::json!({ "default": entry })
                    };
                    if let Some(obj) = entry.as_object_mut() {
                        obj.insert("name".to_string(), Value::String(name.clone()));
                    }
                    Ok(serde_json::from_value(entry)?)
                })
                .collect(),
            other => Ok(serde_json::from_value(other.clone())?),
        }
    }
}

/// Applies variable definitions to the run input.
///
/// Defaults fill names the input does not provide (merged into the input
/// payload when it is an object). Every defined name with a value is also
/// returned as a variable, alongside `input` itself.
///
/// # Errors
///
/// Returns [`WorkflowError::InvalidInput`] for a required variable that has
/// neither an input value nor a default.
pub fn seed_variables(
    input: Value,
    definitions: &[VariableDefinition],
) -> Result<(Value, HashMap<String, Value>), WorkflowError> {
    let mut input = if input.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        input
    };
    let mut variables = HashMap::new();

    for def in definitions {
        let provided = input
            .get(&def.name)
            .filter(|value| !value.is_null())
            .cloned();

        let value = match (provided, &def.default) {
            (Some(value), _) => value,
            (None, Some(default)) => {
                if let Some(obj) = input.as_object_mut() {
                    obj.insert(def.name.clone(), default.clone());
                }
                default.clone()
            }
            (None, None) if def.required => {
                return Err(WorkflowError::InvalidInput(format!(
                    "missing required variable '{}'",
                    def.name
                )));
            }
            (None, None) => continue,
        };
        variables.insert(def.name.clone(), value);
    }

    variables.insert("input".to_string(), input.clone());
    Ok((input, variables))
}
