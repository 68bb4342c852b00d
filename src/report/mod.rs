//! Report rendering: a human-readable Markdown summary and a
//! machine-readable JSON bundle, both built from the cases, the result
//! store and the effective requests that were actually sent.

use std::collections::BTreeMap;

use serde_json::{Value, json};

use crate::config::ApiConfig;
use crate::domain::{TestCase, TestStatus};
use crate::http::compose::effective_request;
use crate::http::dispatch::ResultStore;
use crate::telemetry;

const RESPONSE_SNIPPET_LIMIT: usize = 3000;

fn status_icon(status: TestStatus) -> &'static str {
    match status {
        TestStatus::Pass => "✅",
        TestStatus::Fail => "❌",
        TestStatus::Error => "⚠️",
    }
}

/// Render the whole run as Markdown, in case order.
pub fn markdown_report(cases: &[TestCase], store: &ResultStore, config: &ApiConfig) -> String {
    let stats = store.stats(cases.len());
    let mut out = String::new();

    out.push_str("# API Test Report\n\n");
    out.push_str(&format!("Generated: {}\n\n", telemetry::now_rfc3339()));
    out.push_str(&format!("Base URL: `{}`\n\n", config.base_url));

    out.push_str("## Summary\n\n");
    out.push_str("| Total | Passed | Failed | Errors | Pass rate |\n");
    out.push_str("| --- | --- | --- | --- | --- |\n");
    out.push_str(&format!(
        "| {} | {} | {} | {} | {}% |\n\n",
        stats.total,
        stats.passed,
        stats.failed,
        stats.errors,
        stats.pass_rate_percent()
    ));

    out.push_str("## Cases\n\n");
    for case in cases {
        let icon = store
            .get(&case.id)
            .map(|result| status_icon(result.status))
            .unwrap_or("⚪");
        out.push_str(&format!("### {icon} {}: {}\n\n", case.id, case.title));
        out.push_str(&format!("`{} {}`\n\n", case.method, case.endpoint));
        if !case.description.is_empty() {
            out.push_str(&format!("{}\n\n", case.description));
        }

        let effective = effective_request(case, config);
        // Sort headers so diffs between runs stay readable.
        let headers: BTreeMap<_, _> = effective.headers.iter().collect();
        out.push_str("**Request headers**\n\n");
        out.push_str(&format!(
            "```json\n{}\n```\n\n",
            serde_json::to_string_pretty(&headers).unwrap_or_default()
        ));
        out.push_str("**Request body**\n\n");
        match &effective.body {
            Some(body) => out.push_str(&format!(
                "```json\n{}\n```\n\n",
                serde_json::to_string_pretty(body).unwrap_or_default()
            )),
            None => out.push_str("none\n\n"),
        }

        match store.get(&case.id) {
            Some(result) => {
                out.push_str(&format!("**Result**: {}\n\n", result.status));
                out.push_str(&format!(
                    "- Expected status: {} / Actual status: {}\n",
                    case.expected_status, result.actual_status
                ));
                out.push_str(&format!("- Latency: {} ms\n", result.latency_ms));
                if let Some(message) = &result.error_message {
                    out.push_str(&format!("- Error: {message}\n"));
                }
                out.push('\n');
                out.push_str("**Response**\n\n");
                out.push_str(&response_snippet(&result.response_body));
            }
            None => out.push_str("**Result**: not executed\n\n"),
        }
    }

    out
}

fn response_snippet(body: &Value) -> String {
    let pretty = match body {
        Value::Null => return "none\n\n".to_string(),
        Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_default(),
    };
    if pretty.chars().count() > RESPONSE_SNIPPET_LIMIT {
        let truncated: String = pretty.chars().take(RESPONSE_SNIPPET_LIMIT).collect();
        format!("```\n{truncated}\n```\n\n_(response truncated)_\n\n")
    } else {
        format!("```\n{pretty}\n```\n\n")
    }
}

/// Machine-readable run bundle: metadata, the non-secret config fields,
/// and per-case results alongside the effective request that produced
/// them.
pub fn json_bundle(cases: &[TestCase], store: &ResultStore, config: &ApiConfig) -> Value {
    let stats = store.stats(cases.len());
    let results: Vec<Value> = cases
        .iter()
        .map(|case| {
            let effective = effective_request(case, config);
            json!({
                "case": case,
                "result": store.get(&case.id),
                "effectiveRequest": {
                    "url": effective.url,
                    "headers": effective.headers,
                    "body": effective.body,
                },
            })
        })
        .collect();

    json!({
        "metadata": {
            "generatedAt": telemetry::now_rfc3339(),
            "stats": stats,
        },
        "config": {
            "baseUrl": config.base_url,
            "authHeader": config.auth_header,
        },
        "results": results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{HttpMethod, TestResult};
    use serde_json::json;

    fn fixture() -> (Vec<TestCase>, ResultStore, ApiConfig) {
        let cases = vec![
            TestCase {
                id: "TC-001".into(),
                title: "查询用户".into(),
                description: "按 id 查询单个用户".into(),
                method: HttpMethod::Get,
                endpoint: "/users/1".into(),
                headers: None,
                body: None,
                expected_status: 200,
            },
            TestCase {
                id: "TC-002".into(),
                title: "创建用户".into(),
                description: String::new(),
                method: HttpMethod::Post,
                endpoint: "/users".into(),
                headers: None,
                body: Some(json!({ "name": "张三" })),
                expected_status: 201,
            },
        ];

        let mut store = ResultStore::default();
        store.insert(TestResult {
            test_case_id: "TC-001".into(),
            status: TestStatus::Pass,
            actual_status: 200,
            latency_ms: 42,
            response_body: json!({ "id": 1 }),
            error_message: None,
            timestamp: "2026-08-23T10:00:00Z".into(),
        });

        let config = ApiConfig {
            base_url: "https://api.example.com".into(),
            ..ApiConfig::default()
        };
        (cases, store, config)
    }

    #[test]
    fn markdown_marks_executed_and_pending_cases() {
        let (cases, store, config) = fixture();
        let report = markdown_report(&cases, &store, &config);

        assert!(report.contains("# API Test Report"));
        assert!(report.contains("| 2 | 1 | 0 | 0 | 50% |"));
        assert!(report.contains("### ✅ TC-001: 查询用户"));
        assert!(report.contains("`GET /users/1`"));
        assert!(report.contains("- Latency: 42 ms"));
        assert!(report.contains("### ⚪ TC-002: 创建用户"));
        assert!(report.contains("**Result**: not executed"));
    }

    #[test]
    fn long_response_body_is_truncated() {
        let (cases, mut store, config) = fixture();
        store.insert(TestResult {
            test_case_id: "TC-002".into(),
            status: TestStatus::Fail,
            actual_status: 200,
            latency_ms: 5,
            response_body: Value::String("x".repeat(RESPONSE_SNIPPET_LIMIT + 100)),
            error_message: None,
            timestamp: String::new(),
        });

        let report = markdown_report(&cases, &store, &config);
        assert!(report.contains("_(response truncated)_"));
        assert!(!report.contains(&"x".repeat(RESPONSE_SNIPPET_LIMIT + 1)));
    }

    #[test]
    fn bundle_pairs_each_case_with_its_effective_request() {
        let (cases, store, config) = fixture();
        let bundle = json_bundle(&cases, &store, &config);

        assert_eq!(bundle["metadata"]["stats"]["total"], 2);
        assert_eq!(bundle["config"]["baseUrl"], "https://api.example.com");
        let results = bundle["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(
            results[0]["effectiveRequest"]["url"],
            "https://api.example.com/users/1"
        );
        assert_eq!(results[0]["result"]["status"], "PASS");
        assert!(results[1]["result"].is_null());
        assert_eq!(results[1]["effectiveRequest"]["body"]["name"], "张三");
    }
}
