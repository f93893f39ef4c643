//! Generic webhook delivery adapter.
//!
//! Posts the action config's payload as JSON to the configured URL and
//! classifies failures: network errors, 429, and 5xx responses are
//! retryable; any other non-success status is terminal.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::domain::ports::{ActionAdapter, AdapterError, AdapterResponse};

pub struct WebhookAdapter {
    http: Client,
}

impl WebhookAdapter {
    pub fn new() -> Self {
        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }
}

impl Default for WebhookAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn config_url(config: &Value) -> Result<&str, AdapterError> {
    config
        .get("url")
        .and_then(Value::as_str)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AdapterError::terminal("invalid_config", "webhook config requires a url"))
}

#[async_trait]
impl ActionAdapter for WebhookAdapter {
    async fn execute(&self, config: &Value) -> Result<AdapterResponse, AdapterError> {
        let url = config_url(config)?;
        let payload = config.get("payload").cloned().unwrap_or(Value::Null);

        debug!(url, "delivering webhook");
        let response = self
            .http
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AdapterError::retryable("network_error", e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let external_id = body
                .get("id")
                .and_then(Value::as_str)
                .map(String::from);
            return Ok(AdapterResponse::new(external_id, body));
        }

        let message = format!("webhook returned {status}");
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            Err(AdapterError::retryable(status.as_str(), message))
        } else {
            Err(AdapterError::terminal(status.as_str(), message))
        }
    }
}
