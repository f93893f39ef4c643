//! Signal and customer snapshot value types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A typed, timestamped fact about a customer, produced by the external
/// normalization collaborator. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub customer_id: String,
    pub signal_type: String,
    pub occurred_at: DateTime<Utc>,
    /// Signal strength, 0.0 to 1.0, compared against playbook thresholds.
    pub confidence: f64,
    /// Typed payload attributes, resolved by predicate field lookups.
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
}

impl Signal {
    pub fn new(customer_id: impl Into<String>, signal_type: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            signal_type: signal_type.into(),
            occurred_at: Utc::now(),
            confidence: 1.0,
            attributes: HashMap::new(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }

    /// Estimated value at stake, read from the payload when present.
    pub fn potential_value(&self) -> f64 {
        self.attributes
            .get("potential_value")
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
    }
}

/// A point-in-time view of customer attributes, supplied by the caller for
/// predicate field lookups. The engine never fetches customers itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerSnapshot {
    pub customer_id: String,
    pub name: String,
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
}

impl CustomerSnapshot {
    pub fn new(customer_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            name: name.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}
