//! Core data model shared by the composer, dispatcher, AI pipeline and
//! reports. All wire-facing types serialize with camelCase field names.

use std::collections::HashMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// HTTP methods a generated test case may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    /// Methods that carry a request body. All other methods never do,
    /// regardless of global body params.
    pub fn takes_body(self) -> bool {
        matches!(
            self,
            HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch | HttpMethod::Delete
        )
    }
}

impl Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        };
        write!(f, "{label}")
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
        }
    }
}

/// A single AI-generated test case. Immutable once generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub method: HttpMethod,
    /// Relative path; may carry its own query string.
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    pub expected_status: u16,
}

/// Outcome class of one execution. FAIL is an assertion mismatch on a
/// completed request; ERROR means the request could not be completed or
/// its response could not be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestStatus {
    Pass,
    Fail,
    Error,
}

impl Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TestStatus::Pass => "PASS",
            TestStatus::Fail => "FAIL",
            TestStatus::Error => "ERROR",
        };
        write!(f, "{label}")
    }
}

/// Result of executing one test case. Created exactly once per execution;
/// a re-run replaces the prior result for the same test-case id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub test_case_id: String,
    pub status: TestStatus,
    /// Zero when the request never completed.
    pub actual_status: u16,
    pub latency_ms: u64,
    pub response_body: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// RFC 3339 completion instant.
    pub timestamp: String,
}

/// Configuration hints the model extracted from the documentation.
/// Absent fields stay `None` so the caller can fill only empty fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

/// Transient output of AI generation: extracted config hints plus the
/// ordered test-case list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedTestPlan {
    #[serde(default)]
    pub config: ExtractedConfig,
    #[serde(default)]
    pub cases: Vec<TestCase>,
}

/// Aggregate counts over a suite run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteStats {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub avg_latency_ms: u64,
}

impl SuiteStats {
    /// Pass rate in whole percent over the full case count, counting
    /// unexecuted cases as not passed.
    pub fn pass_rate_percent(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        (self.passed as f64 / self.total as f64 * 100.0).round() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_body_rules() {
        assert!(HttpMethod::Post.takes_body());
        assert!(HttpMethod::Delete.takes_body());
        assert!(!HttpMethod::Get.takes_body());
    }

    #[test]
    fn test_case_uses_camel_case_wire_names() {
        let case: TestCase = serde_json::from_str(
            r#"{
                "id": "TC-001",
                "title": "查询用户",
                "method": "GET",
                "endpoint": "/users",
                "expectedStatus": 200
            }"#,
        )
        .unwrap();
        assert_eq!(case.expected_status, 200);
        assert!(case.headers.is_none());
        assert!(case.body.is_none());
    }

    #[test]
    fn result_serializes_status_uppercase() {
        let result = TestResult {
            test_case_id: "TC-001".into(),
            status: TestStatus::Pass,
            actual_status: 200,
            latency_ms: 12,
            response_body: Value::Null,
            error_message: None,
            timestamp: "2026-01-01T00:00:00Z".into(),
        };
        let raw = serde_json::to_value(&result).unwrap();
        assert_eq!(raw["status"], "PASS");
        assert_eq!(raw["testCaseId"], "TC-001");
        assert!(raw.get("errorMessage").is_none());
    }

    #[test]
    fn extracted_config_absent_fields_stay_none() {
        let config: ExtractedConfig =
            serde_json::from_str(r#"{"baseUrl": "https://api.example.com"}"#).unwrap();
        assert_eq!(config.base_url.as_deref(), Some("https://api.example.com"));
        assert!(config.auth_header.is_none());
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn pass_rate_rounds_over_total_cases() {
        let stats = SuiteStats {
            total: 3,
            passed: 2,
            failed: 1,
            errors: 0,
            avg_latency_ms: 40,
        };
        assert_eq!(stats.pass_rate_percent(), 67);
        assert_eq!(SuiteStats::default().pass_rate_percent(), 0);
    }
}
