//! Predicate condition trees.
//!
//! Playbook trigger conditions are stored as JSON and parsed once, at
//! definition time, into a tagged-variant AST. Malformed trees fail parsing
//! with a validation error; evaluation never interprets the raw form.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::errors::{EngineError, EngineResult};

/// Comparison operator for a leaf condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    In,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::Contains => "contains",
            Self::In => "in",
        }
    }
}

/// A parsed condition tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionNode {
    /// All child conditions must hold.
    And { conditions: Vec<ConditionNode> },
    /// At least one child condition must hold.
    Or { conditions: Vec<ConditionNode> },
    /// The child condition must not hold.
    Not { condition: Box<ConditionNode> },
    /// Compare a context field against a literal value.
    Compare {
        field: String,
        operator: CompareOp,
        value: Value,
    },
}

impl ConditionNode {
    /// Parse a serialized condition tree, validating its structure.
    ///
    /// This is the only place raw JSON is interpreted; callers cache the
    /// result on the playbook so evaluation works on the AST alone.
    pub fn parse(raw: &Value) -> EngineResult<Self> {
        let node: ConditionNode = serde_json::from_value(raw.clone())
            .map_err(|e| EngineError::Validation(format!("Malformed condition tree: {e}")))?;
        node.validate()?;
        Ok(node)
    }

    /// Structural validation applied after deserialization.
    pub fn validate(&self) -> EngineResult<()> {
        match self {
            Self::And { conditions } | Self::Or { conditions } => {
                if conditions.is_empty() {
                    return Err(EngineError::Validation(
                        "And/Or condition requires at least one child".to_string(),
                    ));
                }
                for child in conditions {
                    child.validate()?;
                }
                Ok(())
            }
            Self::Not { condition } => condition.validate(),
            Self::Compare { field, operator, value } => {
                if field.trim().is_empty() {
                    return Err(EngineError::Validation(
                        "Compare condition requires a non-empty field".to_string(),
                    ));
                }
                if *operator == CompareOp::In && !value.is_array() {
                    return Err(EngineError::Validation(format!(
                        "'in' operator requires an array value for field '{field}'"
                    )));
                }
                Ok(())
            }
        }
    }

    /// A short human-readable rendering, used in diagnostics and
    /// missing-condition entries.
    pub fn describe(&self) -> String {
        match self {
            Self::And { conditions } => format!("all of {} conditions", conditions.len()),
            Self::Or { conditions } => format!("any of {} conditions", conditions.len()),
            Self::Not { condition } => format!("not ({})", condition.describe()),
            Self::Compare { field, operator, value } => {
                format!("{field} {} {value}", operator.as_str())
            }
        }
    }
}
