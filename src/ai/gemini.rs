//! Gemini backend: a single schema-constrained `generateContent` call,
//! multimodal when an imported file is present.

use anyhow::{Result, anyhow};
use serde_json::{Value, json};

use crate::ai::{AiConfig, GEMINI_DEFAULT_BASE_URL, GEMINI_DEFAULT_MODEL, prompt};
use crate::config::ImportedFile;

pub async fn generate(
    ai: &AiConfig,
    documentation: &str,
    imported_file: Option<&ImportedFile>,
) -> Result<String> {
    let base = normalize_base(&ai.base_url);
    let model = if ai.model_name.is_empty() {
        GEMINI_DEFAULT_MODEL
    } else {
        ai.model_name.as_str()
    };
    let url = format!("{base}/models/{model}:generateContent");

    let mut parts = vec![json!({ "text": prompt::user_prompt(documentation) })];
    if let Some(file) = imported_file {
        parts.push(json!({
            "inlineData": { "mimeType": file.mime_type, "data": file.data }
        }));
    }

    let body = json!({
        "systemInstruction": { "parts": [{ "text": prompt::SYSTEM_INSTRUCTION }] },
        "contents": [{ "parts": parts }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": prompt::gemini_response_schema()
        }
    });

    let client = reqwest::Client::new();
    let response = client
        .post(&url)
        .query(&[("key", ai.api_key.as_str())])
        .json(&body)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(anyhow!("gemini request failed: {} -> {}", status, snippet(&text)));
    }

    let value: Value = response.json().await?;
    let text = extract_text(&value);
    if text.is_empty() {
        return Err(anyhow!("gemini returned no content"));
    }
    Ok(text)
}

/// Accept either a bare host or a base that already carries an API
/// version segment.
fn normalize_base(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    if trimmed.is_empty() {
        return GEMINI_DEFAULT_BASE_URL.to_string();
    }
    if trimmed.ends_with("/v1")
        || trimmed.ends_with("/v1beta")
        || trimmed.contains("/v1/")
        || trimmed.contains("/v1beta/")
    {
        trimmed.to_string()
    } else {
        format!("{trimmed}/v1beta")
    }
}

fn extract_text(value: &Value) -> String {
    value
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

fn snippet(text: &str) -> &str {
    let end = text
        .char_indices()
        .take(300)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_base_defaults_and_appends_version() {
        assert_eq!(normalize_base(""), GEMINI_DEFAULT_BASE_URL);
        assert_eq!(
            normalize_base("https://generativelanguage.googleapis.com"),
            "https://generativelanguage.googleapis.com/v1beta"
        );
        assert_eq!(
            normalize_base("https://proxy.example.com/v1beta/"),
            "https://proxy.example.com/v1beta"
        );
    }

    #[test]
    fn extract_text_joins_candidate_parts() {
        let value = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "{\"cases\"" }, { "text": ": []}" }] }
            }]
        });
        assert_eq!(extract_text(&value), "{\"cases\": []}");
        assert_eq!(extract_text(&json!({})), "");
    }

    #[test]
    fn snippet_truncates_long_bodies() {
        let long = "x".repeat(1000);
        assert_eq!(snippet(&long).len(), 300);
        assert_eq!(snippet("short"), "short");
    }
}
