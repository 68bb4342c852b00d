//! OpenAI-compatible chat-completions backend, used by every provider
//! without native structured output (DeepSeek, Tongyi, OpenAI and
//! look-alikes).

use anyhow::{Result, anyhow};
use serde_json::{Value, json};

use crate::ai::{AiConfig, prompt};
use crate::config::ImportedFile;

pub async fn generate(
    ai: &AiConfig,
    documentation: &str,
    imported_file: Option<&ImportedFile>,
) -> Result<String> {
    let mut user_prompt = prompt::user_prompt(documentation);
    // Chat endpoints take text only; a binary attachment degrades to a
    // transcription notice instead of a hard failure.
    if let Some(file) = imported_file {
        if !file.mime_type.starts_with("text/") {
            user_prompt.push_str(prompt::DEGRADED_ATTACHMENT_NOTE);
        }
    }

    let url = format!("{}/chat/completions", ai.base_url.trim_end_matches('/'));
    let payload = json!({
        "model": ai.model_name,
        "messages": [
            { "role": "system", "content": prompt::chat_system_prompt() },
            { "role": "user", "content": user_prompt }
        ],
        "stream": false,
        "response_format": { "type": "json_object" }
    });

    let client = reqwest::Client::new();
    let response = client
        .post(&url)
        .bearer_auth(&ai.api_key)
        .json(&payload)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(anyhow!(
            "AI API request failed: {} -> {}",
            status,
            snippet(&text)
        ));
    }

    let value: Value = response.json().await?;
    let content = extract_content(&value);
    if content.is_empty() {
        return Err(anyhow!("model returned no content"));
    }
    Ok(content)
}

fn extract_content(value: &Value) -> String {
    value
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
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
    fn extract_content_reads_first_choice() {
        let value = json!({
            "choices": [{ "message": { "content": "{\"cases\": []}" } }]
        });
        assert_eq!(extract_content(&value), "{\"cases\": []}");
        assert_eq!(extract_content(&json!({"choices": []})), "");
    }
}
