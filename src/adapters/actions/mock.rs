//! Scriptable in-memory adapter for tests and local development.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::domain::ports::{ActionAdapter, AdapterError, AdapterResponse};

/// In-memory adapter that succeeds, fails a fixed number of times before
/// succeeding, or always fails, and records every call it receives.
pub struct MockAdapter {
    fail_times: AtomicU32,
    failure: Option<AdapterError>,
    undoable: bool,
    calls: Mutex<Vec<Value>>,
    undo_calls: Mutex<Vec<Option<String>>>,
}

impl MockAdapter {
    pub fn always_succeeding() -> Self {
        Self {
            fail_times: AtomicU32::new(0),
            failure: None,
            undoable: false,
            calls: Mutex::new(Vec::new()),
            undo_calls: Mutex::new(Vec::new()),
        }
    }

    /// Fail with the given error until `times` calls have been made, then
    /// succeed.
    pub fn failing_times(times: u32, failure: AdapterError) -> Self {
        Self {
            fail_times: AtomicU32::new(times),
            failure: Some(failure),
            undoable: false,
            calls: Mutex::new(Vec::new()),
            undo_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always_failing(failure: AdapterError) -> Self {
        Self {
            fail_times: AtomicU32::new(u32::MAX),
            failure: Some(failure),
            undoable: false,
            calls: Mutex::new(Vec::new()),
            undo_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn undoable(mut self) -> Self {
        self.undoable = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn undo_count(&self) -> usize {
        self.undo_calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ActionAdapter for MockAdapter {
    async fn execute(&self, config: &Value) -> Result<AdapterResponse, AdapterError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(config.clone());
        }

        let remaining = self.fail_times.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != u32::MAX {
                self.fail_times.fetch_sub(1, Ordering::SeqCst);
            }
            if let Some(failure) = &self.failure {
                return Err(failure.clone());
            }
        }

        let external_id = format!("mock-{}", Uuid::new_v4());
        Ok(AdapterResponse::new(Some(external_id), json!({"mock": true})))
    }

    fn supports_undo(&self) -> bool {
        self.undoable
    }

    async fn undo(
        &self,
        _config: &Value,
        external_id: Option<&str>,
    ) -> Result<AdapterResponse, AdapterError> {
        if !self.undoable {
            return Err(AdapterError::unsupported("undo"));
        }
        if let Ok(mut calls) = self.undo_calls.lock() {
            calls.push(external_id.map(String::from));
        }
        Ok(AdapterResponse::empty())
    }
}
