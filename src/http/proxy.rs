//! Relay client side of the dual-path dispatch: serializes the effective
//! request into the relay wire envelope and interprets the relay's
//! answer.

use std::collections::HashMap;

use anyhow::{Context, Result, bail};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Relay path used when the config leaves `proxyUrl` unset; denotes a
/// co-located relay.
pub const DEFAULT_PROXY_PATH: &str = "/api/proxy";

/// Request envelope sent to the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    pub target_url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

/// Response envelope from the relay: the target's status and data on the
/// happy path, or `status: 0` plus `error` when the relay's own outbound
/// call failed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayEnvelope {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub status_text: String,
    #[serde(default)]
    pub headers: Value,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// POST the envelope to the relay and return the relayed
/// `(status, data)`. A relay-level 502 or 404 flags a possibly absent or
/// misconfigured relay and fails the dispatch with the relay's reported
/// error.
pub async fn forward(
    client: &Client,
    proxy_url: &str,
    payload: &RelayRequest,
) -> Result<(u16, Value)> {
    let endpoint = if proxy_url.is_empty() {
        DEFAULT_PROXY_PATH
    } else {
        proxy_url
    };

    let response = client
        .post(endpoint)
        .json(payload)
        .send()
        .await
        .context("relay request failed")?;
    let relay_status = response.status();
    let envelope: RelayEnvelope = response
        .json()
        .await
        .context("relay returned a malformed envelope")?;

    if relay_status == StatusCode::BAD_GATEWAY || relay_status == StatusCode::NOT_FOUND {
        let message = envelope.error.unwrap_or_else(|| {
            format!("relay error (is the local agent running?): {relay_status}")
        });
        bail!(message);
    }

    Ok((envelope.status, envelope.data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_envelope_uses_camel_case_and_omits_absent_body() {
        let payload = RelayRequest {
            target_url: "https://api.example.com/users".into(),
            method: "GET".into(),
            headers: HashMap::from([("Accept".to_string(), "*/*".to_string())]),
            body: None,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["targetUrl"], "https://api.example.com/users");
        assert!(value.get("body").is_none());
    }

    #[test]
    fn failure_envelope_parses_with_defaults() {
        let envelope: RelayEnvelope = serde_json::from_value(json!({
            "status": 0,
            "statusText": "Proxy Network Error",
            "error": "ECONNREFUSED",
            "data": null
        }))
        .unwrap();
        assert_eq!(envelope.status, 0);
        assert_eq!(envelope.error.as_deref(), Some("ECONNREFUSED"));
        assert!(envelope.headers.is_null());
    }
}
