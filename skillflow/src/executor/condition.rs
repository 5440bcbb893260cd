//! Condition evaluation for condition nodes.

use crate::context::ExecutionContext;
use crate::graph::{ComparisonOperator, Condition};
use serde_json::Value;
use std::cmp::Ordering;
use thiserror::Error;

/// A comparison that cannot be applied to its operands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot apply '{operator}' to {left} and {right}")]
pub struct ComparisonError {
    operator: &'static str,
    left: &'static str,
    right: &'static str,
}

impl ComparisonError {
    fn new(operator: ComparisonOperator, left: &Value, right: &Value) -> Self {
        Self {
            operator: operator_name(operator),
            left: type_name(left),
            right: type_name(right),
        }
    }
}

/// JSON truthiness: null, false, zero and empty containers are false.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Evaluates one condition against the context.
///
/// # Errors
///
/// Returns [`ComparisonError`] when a comparison operator does not apply to
/// the resolved operand types.
pub fn evaluate(condition: &Condition, ctx: &ExecutionContext) -> Result<bool, ComparisonError> {
    match condition {
        Condition::Always { .. } => Ok(true),
        Condition::Comparison {
            variable,
            operator,
            value,
            ..
        } => {
            let left = ctx.resolve_value(variable);
            let right = ctx.resolve_value(value);
            compare(*operator, &left, &right)
        }
        Condition::Expression { expression, .. } => Ok(is_truthy(&ctx.resolve_value(expression))),
        Condition::Exists { variable, .. } => Ok(!ctx.resolve_value(variable).is_null()),
    }
}

/// Applies a comparison operator to two resolved values.
///
/// # Errors
///
/// Returns [`ComparisonError`] for operand types the operator does not
/// support, e.g. ordering a string against a number.
pub fn compare(
    operator: ComparisonOperator,
    left: &Value,
    right: &Value,
) -> Result<bool, ComparisonError> {
    use ComparisonOperator as Op;

    match operator {
        Op::Eq => Ok(values_equal(left, right)),
        Op::Ne => Ok(!values_equal(left, right)),
        Op::Gt | Op::Lt | Op::Gte | Op::Lte => {
            let ordering =
                order(left, right).ok_or_else(|| ComparisonError::new(operator, left, right))?;
            Ok(match operator {
                Op::Gt => ordering == Ordering::Greater,
                Op::Lt => ordering == Ordering::Less,
                Op::Gte => ordering != Ordering::Less,
                _ => ordering != Ordering::Greater,
            })
        }
        Op::Contains => contains(left, right).ok_or_else(|| ComparisonError::new(operator, left, right)),
        Op::NotContains => contains(left, right)
            .map(|found| !found)
            .ok_or_else(|| ComparisonError::new(operator, left, right)),
        Op::StartsWith => match (left, right) {
            (Value::String(l), Value::String(r)) => Ok(l.starts_with(r.as_str())),
            _ => Err(ComparisonError::new(operator, left, right)),
        },
        Op::EndsWith => match (left, right) {
            (Value::String(l), Value::String(r)) => Ok(l.ends_with(r.as_str())),
            _ => Err(ComparisonError::new(operator, left, right)),
        },
        Op::IsEmpty => Ok(is_empty(left)),
        Op::IsNotEmpty => Ok(!is_empty(left)),
    }
}

// Numbers compare by value so that 10 == 10.0.
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => l.as_f64() == r.as_f64(),
        _ => left == right,
    }
}

fn order(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => l.as_f64()?.partial_cmp(&r.as_f64()?),
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        _ => None,
    }
}

fn contains(haystack: &Value, needle: &Value) -> Option<bool> {
    match (haystack, needle) {
        (Value::String(h), Value::String(n)) => Some(h.contains(n.as_str())),
        (Value::Array(items), _) => Some(items.iter().any(|item| values_equal(item, needle))),
        (Value::Object(map), Value::String(key)) => Some(map.contains_key(key)),
        _ => None,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

const fn operator_name(operator: ComparisonOperator) -> &'static str {
    match operator {
        ComparisonOperator::Eq => "eq",
        ComparisonOperator::Ne => "ne",
        ComparisonOperator::Gt => "gt",
        ComparisonOperator::Lt => "lt",
        ComparisonOperator::Gte => "gte",
        ComparisonOperator::Lte => "lte",
        ComparisonOperator::Contains => "contains",
        ComparisonOperator::NotContains => "not_contains",
        ComparisonOperator::StartsWith => "starts_with",
        ComparisonOperator::EndsWith => "ends_with",
        ComparisonOperator::IsEmpty => "is_empty",
        ComparisonOperator::IsNotEmpty => "is_not_empty",
    }
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use ComparisonOperator as Op;

    #[test]
    fn test_equality_is_numeric_aware() {
        assert!(compare(Op::Eq, &json!(10), &json!(10.0)).unwrap());
        assert!(compare(Op::Ne, &json!("a"), &json!("b")).unwrap());
        assert!(compare(Op::Eq, &json!({"a": [1]}), &json!({"a": [1]})).unwrap());
        assert!(!compare(Op::Eq, &json!("1"), &json!(1)).unwrap());
    }

    #[test]
    fn test_ordering() {
        assert!(compare(Op::Gt, &json!(10), &json!(5)).unwrap());
        assert!(!compare(Op::Lt, &json!(10), &json!(5)).unwrap());
        assert!(compare(Op::Gte, &json!(5), &json!(5.0)).unwrap());
        assert!(compare(Op::Lte, &json!("abc"), &json!("abd")).unwrap());
    }

    #[test]
    fn test_ordering_type_mismatch_errors() {
        let err = compare(Op::Gt, &json!("ten"), &json!(5)).unwrap_err();
        assert_eq!(err.to_string(), "cannot apply 'gt' to string and number");
        assert!(compare(Op::Lt, &Value::Null, &json!(1)).is_err());
    }

    #[test]
    fn test_membership() {
        assert!(compare(Op::Contains, &json!("hello world"), &json!("world")).unwrap());
        assert!(compare(Op::Contains, &json!([1, 2, 3]), &json!(2.0)).unwrap());
        assert!(compare(Op::Contains, &json!({"k": 1}), &json!("k")).unwrap());
        assert!(compare(Op::NotContains, &json!(["a"]), &json!("b")).unwrap());
        assert!(compare(Op::Contains, &json!(5), &json!(5)).is_err());
    }

    #[test]
    fn test_affixes() {
        assert!(compare(Op::StartsWith, &json!("skillflow"), &json!("skill")).unwrap());
        assert!(compare(Op::EndsWith, &json!("skillflow"), &json!("flow")).unwrap());
        assert!(compare(Op::StartsWith, &json!(["a"]), &json!("a")).is_err());
    }

    #[test]
    fn test_emptiness() {
        for empty in [Value::Null, json!(""), json!([]), json!({})] {
            assert!(compare(Op::IsEmpty, &empty, &Value::Null).unwrap());
        }
        for full in [json!(0), json!(false), json!(" "), json!([0])] {
            assert!(compare(Op::IsNotEmpty, &full, &Value::Null).unwrap());
        }
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!(0.5)));
        assert!(is_truthy(&json!({"a": 1})));
    }

    #[test]
    fn test_evaluate_conditions() {
        let ctx = ExecutionContext::new("e", "w", json!({"flag": true}));
        ctx.set_variable("x", json!(10));

        let comparison: Condition = serde_json::from_value(json!({
            "type": "comparison", "variable": "$variables.x", "operator": "gt", "value": 5
        }))
        .unwrap();
        assert!(evaluate(&comparison, &ctx).unwrap());

        let expression: Condition =
            serde_json::from_value(json!({"type": "expression", "expression": "$input.flag"}))
                .unwrap();
        assert!(evaluate(&expression, &ctx).unwrap());

        let exists: Condition =
            serde_json::from_value(json!({"type": "exists", "variable": "$nodes.A"})).unwrap();
        assert!(!evaluate(&exists, &ctx).unwrap());

        let always: Condition = serde_json::from_value(json!({"type": "always"})).unwrap();
        assert!(evaluate(&always, &ctx).unwrap());
    }
}
