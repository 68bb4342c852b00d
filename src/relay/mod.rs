//! The relay: a small local HTTP agent that performs outbound requests
//! on behalf of a client and wraps every outcome in a well-formed JSON
//! envelope. The target's status (including 4xx/5xx) travels inside the
//! envelope with HTTP 200; only a failure of the relay's own outbound
//! call yields a non-200 relay response.

use anyhow::{Context, Result};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use reqwest::{Client, Method};
use serde_json::{Value, json};

use crate::http::build_header_map;
use crate::http::proxy::{RelayEnvelope, RelayRequest};
use crate::telemetry;

pub fn router() -> Router {
    Router::new()
        .route("/proxy", post(proxy_handler))
        .route("/api/proxy", post(proxy_handler))
}

/// Bind and serve the relay until the process is stopped.
pub async fn run(addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind relay on {addr}"))?;
    println!("relay agent listening on http://{addr}");
    println!("  POST /proxy");
    axum::serve(listener, router())
        .await
        .context("relay server stopped unexpectedly")?;
    Ok(())
}

async fn proxy_handler(Json(payload): Json<RelayRequest>) -> (StatusCode, Json<Value>) {
    telemetry::log_event(
        "relay",
        &format!("{} {}", payload.method, payload.target_url),
    );

    match forward_to_target(&payload).await {
        Ok(envelope) => {
            let body = match serde_json::to_value(&envelope) {
                Ok(value) => value,
                Err(err) => return network_error(&err.to_string()),
            };
            (StatusCode::OK, Json(body))
        }
        Err(err) => {
            telemetry::log_error("relay", &err.to_string());
            network_error(&err.to_string())
        }
    }
}

fn network_error(message: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({
            "status": 0,
            "statusText": "Proxy Network Error",
            "error": message,
            "data": null
        })),
    )
}

/// Perform the outbound request. Target-side error statuses are a
/// success here; only transport failures return `Err`.
async fn forward_to_target(payload: &RelayRequest) -> Result<RelayEnvelope> {
    let method = Method::from_bytes(payload.method.as_bytes())
        .with_context(|| format!("unsupported method `{}`", payload.method))?;
    let headers = build_header_map(&payload.headers)?;

    let client = Client::new();
    let mut request = client
        .request(method, &payload.target_url)
        .headers(headers);
    if let Some(body) = &payload.body {
        request = request.body(serde_json::to_string(body)?);
    }

    let response = request.send().await?;
    let status = response.status();
    let mut header_map = serde_json::Map::new();
    for (name, value) in response.headers() {
        if let Ok(text) = value.to_str() {
            header_map.insert(name.to_string(), Value::String(text.to_string()));
        }
    }
    let text = response.text().await.context("failed to read target response")?;

    // Return structured data when the body is JSON, raw text otherwise.
    let data = serde_json::from_str(&text).unwrap_or(Value::String(text));

    Ok(RelayEnvelope {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
        headers: Value::Object(header_map),
        data,
        error: None,
    })
}
