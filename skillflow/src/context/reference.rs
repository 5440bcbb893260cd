//! The `$root.path` variable reference grammar.
//!
//! ```text
//! reference := "$" root ("." segment)*
//! root      := "input" | "nodes" | "variables" | <variable name>
//! segment   := object key | array index
//! ```
//!
//! Strings that do not start with `$` are literals. A path segment that does
//! not exist resolves to `null`; resolution never fails.

use serde_json::Value;
use std::fmt;

/// The first segment of a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceRoot {
    /// The run input payload.
    Input,
    /// The node output map (`id -> {output, timestamp}`).
    Nodes,
    /// The whole variable store.
    Variables,
    /// A single named variable.
    Variable(String),
}

/// A parsed variable reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Root selector.
    pub root: ReferenceRoot,
    /// Remaining dotted path.
    pub path: Vec<String>,
}

impl Reference {
    /// Parses a reference expression.
    ///
    /// Returns `None` for literals: strings without a leading `$`, and a bare
    /// `$` or `$.` with no root name.
    #[must_use]
    pub fn parse(expr: &str) -> Option<Self> {
        let body = expr.strip_prefix('$')?;
        let mut segments = body.split('.');
        let root = match segments.next()? {
            "" => return None,
            "input" => ReferenceRoot::Input,
            "nodes" => ReferenceRoot::Nodes,
            "variables" => ReferenceRoot::Variables,
            name => ReferenceRoot::Variable(name.to_string()),
        };

        Some(Self {
            root,
            path: segments.map(String::from).collect(),
        })
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let root = match &self.root {
            ReferenceRoot::Input => "input",
            ReferenceRoot::Nodes => "nodes",
            ReferenceRoot::Variables => "variables",
            ReferenceRoot::Variable(name) => name.as_str(),
        };
        write!(f, "${root}")?;
        for segment in &self.path {
            write!(f, ".{segment}")?;
        }
        Ok(())
    }
}

/// Walks `path` into `value`, returning `null` for any missing step.
#[must_use]
pub fn lookup(value: &Value, path: &[String]) -> Value {
    let mut current = value;
    for segment in path {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(v) => current = v,
            None => return Value::Null,
        }
    }
    current.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_roots() {
        assert_eq!(Reference::parse("$input").unwrap().root, ReferenceRoot::Input);
        assert_eq!(Reference::parse("$nodes.a").unwrap().root, ReferenceRoot::Nodes);
        assert_eq!(Reference::parse("$variables.x").unwrap().root, ReferenceRoot::Variables);
        assert_eq!(
            Reference::parse("$count").unwrap().root,
            ReferenceRoot::Variable("count".to_string())
        );
    }

    #[test]
    fn test_parse_path() {
        let reference = Reference::parse("$nodes.A.output.items.0").unwrap();
        assert_eq!(reference.path, vec!["A", "output", "items", "0"]);
        assert_eq!(reference.to_string(), "$nodes.A.output.items.0");
    }

    #[test]
    fn test_literals() {
        assert!(Reference::parse("plain").is_none());
        assert!(Reference::parse("$").is_none());
        assert!(Reference::parse("$.x").is_none());
        assert!(Reference::parse("costs $5").is_none());
    }

    #[test]
    fn test_lookup_objects_and_arrays() {
        let value = json!({"a": {"b": [10, {"c": "deep"}]}});
        assert_eq!(lookup(&value, &[]), value);
        assert_eq!(lookup(&value, &["a".into(), "b".into(), "0".into()]), json!(10));
        assert_eq!(
            lookup(&value, &["a".into(), "b".into(), "1".into(), "c".into()]),
            json!("deep")
        );
    }

    #[test]
    fn test_lookup_missing_is_null() {
        let value = json!({"a": {"b": 1}});
        assert_eq!(lookup(&value, &["x".into()]), Value::Null);
        assert_eq!(lookup(&value, &["a".into(), "b".into(), "c".into()]), Value::Null);
        assert_eq!(lookup(&json!([1]), &["first".into()]), Value::Null);
        assert_eq!(lookup(&json!([1]), &["5".into()]), Value::Null);
    }
}
