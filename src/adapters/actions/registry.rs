//! Action adapter registry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::models::ActionType;
use crate::domain::ports::ActionAdapter;

/// Maps each action type to the adapter that delivers it. Built once at
/// composition time; lookups are read-only thereafter.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<ActionType, Arc<dyn ActionAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, action_type: ActionType, adapter: Arc<dyn ActionAdapter>) {
        self.adapters.insert(action_type, adapter);
    }

    pub fn with_adapter(mut self, action_type: ActionType, adapter: Arc<dyn ActionAdapter>) -> Self {
        self.register(action_type, adapter);
        self
    }

    pub fn get(&self, action_type: ActionType) -> Option<Arc<dyn ActionAdapter>> {
        self.adapters.get(&action_type).cloned()
    }

    pub fn registered_types(&self) -> Vec<ActionType> {
        self.adapters.keys().copied().collect()
    }
}
