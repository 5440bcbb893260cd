//! Workflow nodes and their typed configuration.
//!
//! A raw node arrives as a flat JSON map. [`Node::from_value`] classifies it
//! into a [`NodeKind`] whose variant carries the configuration that node type
//! understands; the untouched `config` map is kept alongside for reporting.

use crate::core::NodeType;
use crate::engine::RetryConfig;
use crate::errors::DagValidationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A single node of a workflow graph. Immutable after parsing.
#[derive(Debug, Clone)]
pub struct Node {
    /// Unique id within the graph.
    pub id: String,
    /// Human-readable name (defaults to the id).
    pub name: String,
    /// Typed behavior of the node.
    pub kind: NodeKind,
    /// The raw configuration map as authored.
    pub config: Value,
    /// Per-node retry policy; the engine default applies when absent.
    pub retry: Option<RetryConfig>,
    /// What to do once retries are exhausted.
    pub error_handling: ErrorHandling,
}

/// The closed set of node behaviors.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Entry point; echoes the run input.
    Start,
    /// Terminal marker.
    End,
    /// Calls the external skill capability.
    Skill(SkillConfig),
    /// Ordered condition evaluation.
    Condition(ConditionConfig),
    /// Data reshaping.
    Transform(TransformConfig),
    /// Concurrent fan-out to branch nodes.
    Parallel(ParallelConfig),
}

impl NodeKind {
    /// Returns the node type this kind was parsed from.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Start => NodeType::Start,
            Self::End => NodeType::End,
            Self::Skill(_) => NodeType::Skill,
            Self::Condition(_) => NodeType::Condition,
            Self::Transform(_) => NodeType::Transform,
            Self::Parallel(_) => NodeType::Parallel,
        }
    }
}

/// Recovery policy applied after the last retry fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorHandling {
    /// Node to run in place of the failed one.
    #[serde(
        default,
        alias = "fallback_node",
        alias = "fallbackNodeId",
        alias = "fallbackNode"
    )]
    pub fallback_node_id: Option<String>,
    /// Report the error as output instead of failing the node.
    #[serde(default, alias = "continueOnError")]
    pub continue_on_error: bool,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    id: String,
    #[serde(rename = "type")]
    node_type: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    config: Value,
    #[serde(default, alias = "retryConfig")]
    retry_config: Option<RetryConfig>,
    #[serde(default, alias = "errorHandling")]
    error_handling: Option<ErrorHandling>,
}

impl Node {
    /// Parses a node from its raw definition map.
    ///
    /// `position` is only used to label errors for nodes without an id.
    ///
    /// # Errors
    ///
    /// Returns a validation error if required fields are missing, the type is
    /// unknown, or the configuration does not fit the node type.
    pub fn from_value(raw: &Value, position: usize) -> Result<Self, DagValidationError> {
        let label = raw
            .get("id")
            .and_then(Value::as_str)
            .map_or_else(|| format!("#{position}"), String::from);

        let raw: RawNode = serde_json::from_value(raw.clone())
            .map_err(|e| DagValidationError::node(&label, e.to_string()))?;

        let node_type: NodeType = raw
            .node_type
            .parse()
            .map_err(|e: String| DagValidationError::node(&raw.id, e))?;

        let config = if raw.config.is_null() {
            Value::Object(serde_json::Map::new())
        } else {
            raw.config
        };

        let kind = match node_type {
            NodeType::Start => NodeKind::Start,
            NodeType::End => NodeKind::End,
            NodeType::Skill => NodeKind::Skill(typed_config(&raw.id, &config)?),
            NodeType::Condition => NodeKind::Condition(typed_config(&raw.id, &config)?),
            NodeType::Transform => NodeKind::Transform(typed_config(&raw.id, &config)?),
            NodeType::Parallel => NodeKind::Parallel(typed_config(&raw.id, &config)?),
        };

        Ok(Self {
            name: raw.name.unwrap_or_else(|| raw.id.clone()),
            id: raw.id,
            kind,
            config,
            retry: raw.retry_config,
            error_handling: raw.error_handling.unwrap_or_default(),
        })
    }

    /// Returns the node type.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }
}

fn typed_config<T: serde::de::DeserializeOwned>(
    node_id: &str,
    config: &Value,
) -> Result<T, DagValidationError> {
    serde_json::from_value(config.clone())
        .map_err(|e| DagValidationError::node(node_id, format!("invalid config: {e}")))
}

/// Identifies a skill for the invocation capability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillRef {
    /// Lookup by id.
    Id(String),
    /// Lookup by slug.
    Slug(String),
}

impl SkillRef {
    /// Returns the id or slug.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Id(s) | Self::Slug(s) => s,
        }
    }
}

impl fmt::Display for SkillRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration of a skill node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillConfig {
    /// Skill id; preferred over the slug.
    #[serde(default)]
    pub skill_id: Option<String>,
    /// Skill slug.
    #[serde(default)]
    pub skill_slug: Option<String>,
    /// Parameters, resolved against the context before invocation.
    #[serde(default = "empty_object")]
    pub params: Value,
    /// Also store the result under this variable name.
    #[serde(default)]
    pub output_variable: Option<String>,
}

impl SkillConfig {
    /// Returns the skill reference, if one is configured.
    #[must_use]
    pub fn skill_ref(&self) -> Option<SkillRef> {
        self.skill_id
            .clone()
            .map(SkillRef::Id)
            .or_else(|| self.skill_slug.clone().map(SkillRef::Slug))
    }
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Configuration of a condition node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConditionConfig {
    /// Conditions in evaluation order.
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// A single condition; the first one that holds wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// Always holds.
    Always {
        /// Optional identifier reported on match.
        #[serde(default)]
        id: Option<Value>,
    },
    /// Compares a resolved variable against a resolved value.
    Comparison {
        /// Optional identifier reported on match.
        #[serde(default)]
        id: Option<Value>,
        /// Left-hand side, usually a reference.
        #[serde(default)]
        variable: Value,
        /// The comparison to apply.
        operator: ComparisonOperator,
        /// Right-hand side.
        #[serde(default)]
        value: Value,
    },
    /// Holds when the resolved expression is truthy.
    Expression {
        /// Optional identifier reported on match.
        #[serde(default)]
        id: Option<Value>,
        /// The expression, usually a reference.
        #[serde(default)]
        expression: Value,
    },
    /// Holds when the reference resolves to a non-null value.
    Exists {
        /// Optional identifier reported on match.
        #[serde(default)]
        id: Option<Value>,
        /// The reference to check.
        #[serde(default)]
        variable: Value,
    },
}

impl Condition {
    /// Returns the configured identifier.
    #[must_use]
    pub fn id(&self) -> Option<&Value> {
        match self {
            Self::Always { id }
            | Self::Comparison { id, .. }
            | Self::Expression { id, .. }
            | Self::Exists { id, .. } => id.as_ref(),
        }
    }
}

/// Operators available to comparison conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Greater than.
    Gt,
    /// Less than.
    Lt,
    /// Greater than or equal.
    Gte,
    /// Less than or equal.
    Lte,
    /// Substring, element or key membership.
    Contains,
    /// Negated membership.
    NotContains,
    /// String prefix.
    StartsWith,
    /// String suffix.
    EndsWith,
    /// Null, empty string, empty array or empty object.
    IsEmpty,
    /// Negation of `is_empty`.
    IsNotEmpty,
}

/// Configuration of a transform node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransformConfig {
    /// Resolve one reference and return it.
    Expression {
        /// The expression to resolve.
        #[serde(default)]
        expression: Value,
    },
    /// Build a map of `target_key -> resolved source expression`.
    Mapping {
        /// The mapping table.
        #[serde(default)]
        mapping: serde_json::Map<String, Value>,
    },
    /// Union resolved map sources left to right.
    Merge {
        /// Source expressions.
        #[serde(default)]
        sources: Vec<Value>,
    },
}

/// Configuration of a parallel node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Branch node ids in configured order.
    #[serde(default)]
    pub branches: Vec<BranchRef>,
}

/// A branch of a parallel node, given as a bare id or `{node_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BranchRef {
    /// Bare node id.
    Id(String),
    /// Object form.
    Node {
        /// The branch node id.
        node_id: String,
    },
}

impl BranchRef {
    /// Returns the referenced node id.
    #[must_use]
    pub fn node_id(&self) -> &str {
        match self {
            Self::Id(id) | Self::Node { node_id: id } => id,
        }
    }
}
