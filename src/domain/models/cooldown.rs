//! Cooldown records.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Last-fired bookkeeping for one (customer, playbook) pair. Written only
/// when a run is actually created, never on a mere evaluation attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CooldownRecord {
    pub customer_id: String,
    pub playbook_id: Uuid,
    pub last_fired_at: DateTime<Utc>,
}

impl CooldownRecord {
    pub fn new(customer_id: impl Into<String>, playbook_id: Uuid, last_fired_at: DateTime<Utc>) -> Self {
        Self { customer_id: customer_id.into(), playbook_id, last_fired_at }
    }

    /// When the cooldown window for the given setting expires.
    pub fn ends_at(&self, cooldown_hours: u32) -> DateTime<Utc> {
        self.last_fired_at + Duration::hours(i64::from(cooldown_hours))
    }

    /// Whether the window is still open at `now`. A zero-hour cooldown
    /// never suppresses.
    pub fn is_active(&self, cooldown_hours: u32, now: DateTime<Utc>) -> bool {
        cooldown_hours > 0 && now < self.ends_at(cooldown_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_arithmetic() {
        let record = CooldownRecord {
            customer_id: "c".to_string(),
            playbook_id: Uuid::new_v4(),
            last_fired_at: Utc::now() - Duration::hours(2),
        };
        assert!(record.is_active(24, Utc::now()));
        assert!(!record.is_active(1, Utc::now()));
        assert!(!record.is_active(0, Utc::now()));
    }
}
