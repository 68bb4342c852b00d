//! The dispatcher: executes one effective request (directly or through
//! the relay) and classifies the outcome.
//!
//! Single attempt per case, no retry. This function never returns an
//! error: an assertion mismatch on a completed request is FAIL, anything
//! that prevented completing or interpreting the request is ERROR with
//! `actual_status = 0`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use serde_json::Value;

use crate::config::ApiConfig;
use crate::domain::{SuiteStats, TestCase, TestResult, TestStatus};
use crate::http::compose::{EffectiveRequest, effective_request};
use crate::http::proxy::{self, DEFAULT_PROXY_PATH, RelayRequest};
use crate::http::build_header_map;
use crate::telemetry;

const CONNECTIVITY_HINT: &str = "network error (possible CORS or connectivity issue)";

/// Execute one test case against the configured target.
pub async fn execute_test_case(config: &ApiConfig, case: &TestCase) -> TestResult {
    let started = Instant::now();
    let outcome = attempt(config, case).await;
    let latency_ms = started.elapsed().as_millis() as u64;
    let timestamp = telemetry::now_rfc3339();

    match outcome {
        Ok((actual_status, response_body)) => {
            let status = if actual_status == case.expected_status {
                TestStatus::Pass
            } else {
                TestStatus::Fail
            };
            TestResult {
                test_case_id: case.id.clone(),
                status,
                actual_status,
                latency_ms,
                response_body,
                error_message: None,
                timestamp,
            }
        }
        Err(err) => {
            let mut message = err.to_string();
            if message.is_empty() {
                message = CONNECTIVITY_HINT.to_string();
            }
            TestResult {
                test_case_id: case.id.clone(),
                status: TestStatus::Error,
                actual_status: 0,
                latency_ms,
                response_body: Value::Null,
                error_message: Some(message),
                timestamp,
            }
        }
    }
}

async fn attempt(config: &ApiConfig, case: &TestCase) -> Result<(u16, Value)> {
    let effective = effective_request(case, config);
    let client = Client::builder()
        .redirect(Policy::limited(10))
        .build()
        .context("failed to build HTTP client")?;

    if config.use_server_proxy {
        let payload = RelayRequest {
            target_url: effective.url,
            method: case.method.to_string(),
            headers: effective.headers,
            body: effective.body,
        };
        let proxy_url = if config.proxy_url.is_empty() {
            DEFAULT_PROXY_PATH
        } else {
            config.proxy_url.as_str()
        };
        proxy::forward(&client, proxy_url, &payload).await
    } else {
        send_direct(&client, case, &effective).await
    }
}

/// Direct mode: send from this process's own network context and read
/// the body as JSON when the content type says so, falling back to raw
/// text.
async fn send_direct(
    client: &Client,
    case: &TestCase,
    effective: &EffectiveRequest,
) -> Result<(u16, Value)> {
    let headers = build_header_map(&effective.headers)?;
    let mut request = client
        .request(case.method.into(), &effective.url)
        .headers(headers);
    if let Some(body) = &effective.body {
        request = request.body(serde_json::to_string(body)?);
    }

    let response = request.send().await?;
    let actual_status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let text = response.text().await.context("failed to read response")?;

    let body = if content_type.contains("application/json") {
        match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(_) => Value::String(text),
        }
    } else {
        Value::String(text)
    };

    Ok((actual_status, body))
}

/// Execution results keyed by test-case id. Insertion order is execution
/// order; re-inserting a result for the same id overwrites in place, so
/// the store never outgrows the test-case count.
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    order: Vec<String>,
    by_id: HashMap<String, TestResult>,
}

impl ResultStore {
    pub fn insert(&mut self, result: TestResult) {
        if !self.by_id.contains_key(&result.test_case_id) {
            self.order.push(result.test_case_id.clone());
        }
        self.by_id.insert(result.test_case_id.clone(), result);
    }

    pub fn get(&self, test_case_id: &str) -> Option<&TestResult> {
        self.by_id.get(test_case_id)
    }

    /// Results in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &TestResult> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn stats(&self, total_cases: usize) -> SuiteStats {
        let mut stats = SuiteStats {
            total: total_cases,
            ..SuiteStats::default()
        };
        let mut latency_sum = 0u64;
        for result in self.iter() {
            match result.status {
                TestStatus::Pass => stats.passed += 1,
                TestStatus::Fail => stats.failed += 1,
                TestStatus::Error => stats.errors += 1,
            }
            latency_sum += result.latency_ms;
        }
        if !self.is_empty() {
            stats.avg_latency_ms = latency_sum / self.len() as u64;
        }
        stats
    }
}

/// Run all cases strictly sequentially: one case's full cycle completes
/// (or errors) before the next begins, and a per-case error never stops
/// the rest of the run. The optional pacing delay exists for consumers
/// that want staged updates; zero is fine.
pub async fn run_suite<F>(
    config: &ApiConfig,
    cases: &[TestCase],
    pacing: Duration,
    store: &mut ResultStore,
    mut on_result: F,
) where
    F: FnMut(&TestCase, &TestResult),
{
    for case in cases {
        let result = execute_test_case(config, case).await;
        telemetry::log_event(
            "run",
            &format!(
                "{} {} -> {} (expected {}, got {}, {} ms)",
                case.method,
                case.endpoint,
                result.status,
                case.expected_status,
                result.actual_status,
                result.latency_ms
            ),
        );
        on_result(case, &result);
        store.insert(result);
        if !pacing.is_zero() {
            tokio::time::sleep(pacing).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::HttpMethod;
    use axum::Json;
    use axum::routing::{get, post};
    use serde_json::json;

    fn make_case(method: HttpMethod, endpoint: &str, expected_status: u16) -> TestCase {
        TestCase {
            id: format!("TC-{endpoint}-{expected_status}"),
            title: String::new(),
            description: String::new(),
            method,
            endpoint: endpoint.into(),
            headers: None,
            body: None,
            expected_status,
        }
    }

    fn make_result(id: &str, status: TestStatus, latency_ms: u64) -> TestResult {
        TestResult {
            test_case_id: id.into(),
            status,
            actual_status: 200,
            latency_ms,
            response_body: Value::Null,
            error_message: None,
            timestamp: String::new(),
        }
    }

    /// Loopback server exposing the relay routes plus two plain target
    /// endpoints.
    async fn spawn_test_server() -> String {
        let app = crate::relay::router()
            .route("/ping", get(|| async { Json(json!({ "ok": true })) }))
            .route(
                "/echo",
                post(|Json(body): Json<Value>| async move { Json(body) }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn direct_mode_classifies_pass_and_fail() {
        let base = spawn_test_server().await;
        let config = ApiConfig {
            base_url: base,
            ..ApiConfig::default()
        };

        let pass = execute_test_case(&config, &make_case(HttpMethod::Get, "/ping", 200)).await;
        assert_eq!(pass.status, TestStatus::Pass);
        assert_eq!(pass.actual_status, 200);
        assert_eq!(pass.response_body, json!({ "ok": true }));
        assert!(pass.error_message.is_none());

        let fail = execute_test_case(&config, &make_case(HttpMethod::Get, "/ping", 201)).await;
        assert_eq!(fail.status, TestStatus::Fail);
        assert_eq!(fail.actual_status, 200);
    }

    #[tokio::test]
    async fn direct_mode_unreachable_target_is_error() {
        // Scenario E from the product contract.
        let config = ApiConfig {
            base_url: "http://127.0.0.1:1".into(),
            ..ApiConfig::default()
        };

        let result = execute_test_case(&config, &make_case(HttpMethod::Get, "/ping", 200)).await;
        assert_eq!(result.status, TestStatus::Error);
        assert_eq!(result.actual_status, 0);
        assert_eq!(result.response_body, Value::Null);
        assert!(result.error_message.is_some());
    }

    #[tokio::test]
    async fn direct_mode_sends_merged_body() {
        let base = spawn_test_server().await;
        let mut config = ApiConfig {
            base_url: base,
            ..ApiConfig::default()
        };
        config
            .global_body_params
            .push(crate::config::OverrideEntry::new("app_secret", "s3cr3t"));

        let mut case = make_case(HttpMethod::Post, "/echo", 200);
        case.body = Some(json!({ "name": "alice" }));

        let result = execute_test_case(&config, &case).await;
        assert_eq!(result.status, TestStatus::Pass);
        assert_eq!(
            result.response_body,
            json!({ "name": "alice", "app_secret": "s3cr3t" })
        );
    }

    #[tokio::test]
    async fn proxy_mode_round_trips_through_the_relay() {
        let base = spawn_test_server().await;
        let config = ApiConfig {
            base_url: base.clone(),
            use_server_proxy: true,
            proxy_url: format!("{base}/proxy"),
            ..ApiConfig::default()
        };

        let result = execute_test_case(&config, &make_case(HttpMethod::Get, "/ping", 200)).await;
        assert_eq!(result.status, TestStatus::Pass);
        assert_eq!(result.actual_status, 200);
        assert_eq!(result.response_body, json!({ "ok": true }));
    }

    #[tokio::test]
    async fn relay_outbound_failure_surfaces_as_error() {
        // Scenario D shape: the relay answers 502 with an error field.
        let base = spawn_test_server().await;
        let config = ApiConfig {
            base_url: "http://127.0.0.1:1".into(),
            use_server_proxy: true,
            proxy_url: format!("{base}/proxy"),
            ..ApiConfig::default()
        };

        let result = execute_test_case(&config, &make_case(HttpMethod::Get, "/ping", 200)).await;
        assert_eq!(result.status, TestStatus::Error);
        assert_eq!(result.actual_status, 0);
        assert_eq!(result.response_body, Value::Null);
        assert!(result.error_message.is_some());
    }

    #[tokio::test]
    async fn missing_relay_endpoint_is_error_not_fail() {
        let base = spawn_test_server().await;
        let config = ApiConfig {
            base_url: base.clone(),
            use_server_proxy: true,
            proxy_url: format!("{base}/no-such-relay"),
            ..ApiConfig::default()
        };

        let result = execute_test_case(&config, &make_case(HttpMethod::Get, "/ping", 200)).await;
        assert_eq!(result.status, TestStatus::Error);
    }

    #[tokio::test]
    async fn suite_runs_sequentially_and_never_aborts() {
        let base = spawn_test_server().await;
        let config = ApiConfig {
            base_url: base,
            ..ApiConfig::default()
        };
        let cases = vec![
            make_case(HttpMethod::Get, "/ping", 200),
            make_case(HttpMethod::Get, "/no-such-path", 200),
            make_case(HttpMethod::Get, "/ping", 201),
        ];

        let mut store = ResultStore::default();
        let mut seen = Vec::new();
        run_suite(&config, &cases, Duration::ZERO, &mut store, |case, result| {
            seen.push((case.id.clone(), result.status));
        })
        .await;

        assert_eq!(store.len(), 3);
        let statuses: Vec<_> = store.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![TestStatus::Pass, TestStatus::Fail, TestStatus::Fail]
        );
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn store_overwrites_on_rerun_and_keeps_order() {
        let mut store = ResultStore::default();
        store.insert(make_result("a", TestStatus::Fail, 10));
        store.insert(make_result("b", TestStatus::Pass, 20));
        store.insert(make_result("a", TestStatus::Pass, 30));

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("a").unwrap().status, TestStatus::Pass);
        let order: Vec<_> = store.iter().map(|r| r.test_case_id.as_str()).collect();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn stats_count_outcomes_and_average_latency() {
        let mut store = ResultStore::default();
        store.insert(make_result("a", TestStatus::Pass, 10));
        store.insert(make_result("b", TestStatus::Fail, 30));
        store.insert(make_result("c", TestStatus::Error, 20));

        let stats = store.stats(4);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.passed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.avg_latency_ms, 20);
    }
}
