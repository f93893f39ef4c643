//! Predicate evaluation against a customer + signal context.
//!
//! Works only on the parsed AST; And/Or short-circuit, and missing fields
//! compare as non-matching rather than raising.

use serde_json::Value;

use crate::domain::models::predicate::{CompareOp, ConditionNode};
use crate::domain::models::{CustomerSnapshot, Signal};

/// Field-lookup context for one evaluation. Signal attributes shadow
/// customer attributes when both carry the same key.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub signal: &'a Signal,
    pub customer: &'a CustomerSnapshot,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(signal: &'a Signal, customer: &'a CustomerSnapshot) -> Self {
        Self { signal, customer }
    }

    fn lookup(&self, field: &str) -> Option<&'a Value> {
        self.signal
            .attributes
            .get(field)
            .or_else(|| self.customer.attributes.get(field))
    }
}

/// Evaluate a parsed condition tree. Never errors: unknown fields and
/// type-mismatched comparisons are simply non-matching.
pub fn evaluate(node: &ConditionNode, ctx: &EvaluationContext<'_>) -> bool {
    match node {
        ConditionNode::And { conditions } => conditions.iter().all(|c| evaluate(c, ctx)),
        ConditionNode::Or { conditions } => conditions.iter().any(|c| evaluate(c, ctx)),
        ConditionNode::Not { condition } => !evaluate(condition, ctx),
        ConditionNode::Compare { field, operator, value } => match ctx.lookup(field) {
            Some(actual) => compare(*operator, actual, value),
            None => false,
        },
    }
}

/// Clauses within the tree that do not hold, for diagnostics. Leaf-level
/// only: a failing And reports its failing children, not itself.
pub fn unmet_clauses(node: &ConditionNode, ctx: &EvaluationContext<'_>) -> Vec<String> {
    let mut unmet = Vec::new();
    collect_unmet(node, ctx, &mut unmet);
    unmet
}

fn collect_unmet(node: &ConditionNode, ctx: &EvaluationContext<'_>, unmet: &mut Vec<String>) {
    if evaluate(node, ctx) {
        return;
    }
    match node {
        ConditionNode::And { conditions } | ConditionNode::Or { conditions } => {
            for child in conditions {
                collect_unmet(child, ctx, unmet);
            }
        }
        ConditionNode::Not { .. } | ConditionNode::Compare { .. } => {
            unmet.push(node.describe());
        }
    }
}

fn compare(op: CompareOp, actual: &Value, expected: &Value) -> bool {
    match op {
        CompareOp::Equals => json_eq(actual, expected),
        CompareOp::NotEquals => !json_eq(actual, expected),
        CompareOp::GreaterThan => match (actual.as_f64(), expected.as_f64()) {
            (Some(a), Some(e)) => a > e,
            _ => false,
        },
        CompareOp::LessThan => match (actual.as_f64(), expected.as_f64()) {
            (Some(a), Some(e)) => a < e,
            _ => false,
        },
        CompareOp::Contains => match (actual, expected) {
            (Value::String(a), Value::String(e)) => a.contains(e.as_str()),
            (Value::Array(items), e) => items.iter().any(|item| json_eq(item, e)),
            _ => false,
        },
        CompareOp::In => match expected {
            Value::Array(candidates) => candidates.iter().any(|c| json_eq(actual, c)),
            _ => false,
        },
    }
}

/// Equality with numeric coercion so `5` and `5.0` compare equal.
fn json_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => (x - y).abs() < f64::EPSILON,
        _ => a == b,
    }
}
