use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use crate::domain::errors::EngineResult;

/// External segment-membership capability, consumed by the engine.
/// Computing membership itself is out of scope.
#[async_trait]
pub trait SegmentMatcher: Send + Sync {
    /// All segment ids the customer currently belongs to.
    async fn segments_for(&self, customer_id: &str) -> EngineResult<HashSet<String>>;
}

/// In-memory segment matcher for tests and embedded use.
#[derive(Default)]
pub struct StaticSegmentMatcher {
    memberships: RwLock<HashMap<String, HashSet<String>>>,
}

impl StaticSegmentMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_member(&self, customer_id: impl Into<String>, segment: impl Into<String>) {
        let mut memberships = self.memberships.write().await;
        memberships
            .entry(customer_id.into())
            .or_default()
            .insert(segment.into());
    }
}

#[async_trait]
impl SegmentMatcher for StaticSegmentMatcher {
    async fn segments_for(&self, customer_id: &str) -> EngineResult<HashSet<String>> {
        let memberships = self.memberships.read().await;
        Ok(memberships.get(customer_id).cloned().unwrap_or_default())
    }
}
