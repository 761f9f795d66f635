//! Hue bridge transport — inventory discovery, light state changes and
//! link-button pairing over the bridge's v1 REST API.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::AppError;
use crate::model::{BridgeInventory, LightId, LightState};

/// Hue error type returned when pairing without pressing the link button.
const LINK_BUTTON_NOT_PRESSED: u64 = 101;

/// Device-control RPC used by the controller. One call per light id.
#[async_trait]
pub trait Bridge: Send + Sync {
    /// Full light and group inventory.
    async fn inventory(&self) -> Result<BridgeInventory, AppError>;

    /// Apply `state` to a single light.
    async fn set_state(&self, id: &LightId, state: &LightState) -> Result<(), AppError>;
}

// ── Hue HTTP implementation ──────────────────────────────────────

pub struct HueBridge {
    client: reqwest::Client,
    base_url: String,
}

impl HueBridge {
    pub fn new(address: &str, username: &str, timeout: Duration) -> Result<Self, AppError> {
        let client = build_client(timeout)?;
        Ok(Self {
            client,
            base_url: format!("{}/api/{username}", bridge_root(address)),
        })
    }

    /// Register a new user with the bridge. The link button must have been
    /// pressed within the last 30 seconds.
    pub async fn pair(address: &str, devicetype: &str, timeout: Duration) -> Result<String, AppError> {
        let client = build_client(timeout)?;
        let url = format!("{}/api", bridge_root(address));
        tracing::debug!(%url, devicetype, "pairing with bridge");

        let reply = send_json(client.post(&url).json(&serde_json::json!({ "devicetype": devicetype }))).await?;
        check_hue_errors(&reply)?;

        reply
            .as_array()
            .and_then(|entries| entries.first())
            .and_then(|entry| entry.pointer("/success/username"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AppError::bridge("Pairing reply did not contain a username"))
    }
}

#[async_trait]
impl Bridge for HueBridge {
    async fn inventory(&self) -> Result<BridgeInventory, AppError> {
        tracing::debug!("fetching bridge inventory");
        let reply = send_json(self.client.get(&self.base_url)).await?;
        check_hue_errors(&reply)?;
        serde_json::from_value(reply)
            .map_err(|e| AppError::bridge(format!("Unexpected inventory format: {e}")))
    }

    async fn set_state(&self, id: &LightId, state: &LightState) -> Result<(), AppError> {
        let url = format!("{}/lights/{id}/state", self.base_url);
        tracing::debug!(light = %id, on = state.on, bri = ?state.bri, "setting light state");
        let reply = send_json(self.client.put(&url).json(state)).await?;
        check_hue_errors(&reply)
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::bridge(format!("Failed to build HTTP client: {e}")))
}

/// Accept either a bare host/IP or a full URL.
fn bridge_root(address: &str) -> String {
    let address = address.trim_end_matches('/');
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{address}")
    }
}

async fn send_json(request: reqwest::RequestBuilder) -> Result<Value, AppError> {
    let response = request
        .send()
        .await
        .map_err(|e| AppError::bridge(format!("Request failed: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(AppError::bridge(format!("HTTP {status}: {text}")));
    }

    response
        .json()
        .await
        .map_err(|e| AppError::bridge(format!("Failed to parse response: {e}")))
}

/// Hue answers HTTP 200 even on failure and reports errors as
/// `[{"error": {"type": .., "description": ..}}]`.
fn check_hue_errors(reply: &Value) -> Result<(), AppError> {
    let Some(entries) = reply.as_array() else {
        return Ok(());
    };

    for entry in entries {
        if let Some(error) = entry.get("error") {
            if error.get("type").and_then(Value::as_u64) == Some(LINK_BUTTON_NOT_PRESSED) {
                return Err(AppError::LinkButtonNotPressed);
            }
            let description = error
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            let address = error.get("address").and_then(Value::as_str).unwrap_or("");
            return Err(AppError::bridge(if address.is_empty() {
                description.to_string()
            } else {
                format!("{description} ({address})")
            }));
        }
    }
    Ok(())
}
