//! Recovery of a structured test plan from free-form model output.
//!
//! Two stages, kept separate so diagnostics can tell them apart: strip a
//! Markdown code fence and parse the whole reply (a failure here is
//! fatal, the only recourse is regenerating), then soft-decode each
//! case's stringified `body`/`headers` fields (a failure there degrades
//! that field to absent without touching the rest of the batch).

use std::collections::HashMap;

use anyhow::{Context, Result};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::{ExtractedConfig, GeneratedTestPlan, HttpMethod, TestCase};

pub fn parse_plan(raw: &str) -> Result<GeneratedTestPlan> {
    let cleaned = strip_code_fence(raw);
    let parsed: Value = serde_json::from_str(cleaned)
        .context("model reply is not valid JSON; regenerate the plan")?;

    let config = parsed
        .get("config")
        .cloned()
        .map(|value| serde_json::from_value::<ExtractedConfig>(value).unwrap_or_default())
        .unwrap_or_default();

    let cases = parsed
        .get("cases")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .filter_map(normalize_case)
        .collect();

    Ok(GeneratedTestPlan { config, cases })
}

/// Remove a surrounding ``` fence, tolerating an optional `json` language
/// tag.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    let inner = inner.strip_prefix('\n').unwrap_or(inner);
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    let inner = inner.strip_suffix('\n').unwrap_or(inner);
    inner.trim()
}

/// One case. Cases missing a usable method, endpoint or expected status
/// are dropped; malformed `body`/`headers` degrade to absent; a missing
/// id gets a synthetic one so results can still be keyed.
fn normalize_case(item: Value) -> Option<TestCase> {
    let method: HttpMethod = serde_json::from_value(item.get("method")?.clone()).ok()?;
    let endpoint = item.get("endpoint")?.as_str()?.to_string();
    let expected_status = item.get("expectedStatus")?.as_u64()? as u16;

    let body = match soft_decode(item.get("body")) {
        Some(Value::Object(map)) if map.is_empty() => None,
        other => other,
    };
    let headers = soft_decode(item.get("headers"))
        .and_then(|value| serde_json::from_value::<HashMap<String, String>>(value).ok());

    let id = item
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(synthetic_case_id);

    Some(TestCase {
        id,
        title: string_field(&item, "title"),
        description: string_field(&item, "description"),
        method,
        endpoint,
        headers,
        body,
        expected_status,
    })
}

/// Accept a field as either an already-structured value or a
/// JSON-encoded string; an undecodable string yields `None`.
fn soft_decode(value: Option<&Value>) -> Option<Value> {
    match value? {
        Value::Null => None,
        Value::String(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return None;
            }
            serde_json::from_str(trimmed).ok()
        }
        other => Some(other.clone()),
    }
}

fn string_field(item: &Value, key: &str) -> String {
    item.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn synthetic_case_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("TC-{}", &suffix[..9])
}
