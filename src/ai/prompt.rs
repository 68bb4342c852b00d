//! Fixed prompt material sent to every provider, plus the response schema
//! used for Gemini's structured-output mode.

use serde_json::{Value, json};

/// System instruction shared by all providers. Titles and descriptions
/// are required in Simplified Chinese; `body`/`headers` are requested as
/// JSON-encoded strings so the reply schema stays flat.
pub const SYSTEM_INSTRUCTION: &str = "\
You are a senior QA automation engineer. Analyze the provided API \
documentation in depth and complete the following tasks.

1. Extract the environment configuration: the base URL and the standard \
authentication convention (e.g. the Authorization header).
2. Identify interface-specific required parameters. This is critical: \
when an endpoint requires fields such as `app_key`, `app_secret`, \
`sign`, `timestamp`, `nonce` or business ids, those fields MUST appear \
in the generated test cases. Endpoint-specific headers (e.g. \
`X-Channel-ID`) belong in the `headers` field. For GET requests append \
such parameters to the `endpoint` query string; for POST/PUT requests \
include them in the `body` JSON. When the documentation names a field \
without a concrete value, use a reasonable placeholder (e.g. \
\"YOUR_APP_KEY\").
3. Generate test cases covering the happy path and the key error \
scenarios. Every `title` and `description` must be written in Simplified \
Chinese. `endpoint` must be a relative path. `body` must be a \
JSON-encoded string. `headers` must be a JSON-encoded string of \
key/value pairs.

Return pure JSON with no Markdown wrapping.";

/// Shape example appended for chat-completion providers, which have no
/// native schema enforcement.
const JSON_SHAPE_EXAMPLE: &str = r#"
Respond strictly in the following JSON shape (title and description in
Simplified Chinese):
{
  "config": { "baseUrl": "...", "authHeader": "...", "authToken": "..." },
  "cases": [
    {
      "id": "TC-001",
      "title": "测试用例标题",
      "description": "测试意图描述",
      "method": "GET|POST...",
      "endpoint": "/api/...",
      "headers": "{\"Key\":\"Val\"}",
      "body": "{\"key\":\"val\"}",
      "expectedStatus": 200
    }
  ]
}"#;

/// Degraded-mode notice for chat-style providers that cannot accept
/// binary input.
pub const DEGRADED_ATTACHMENT_NOTE: &str = "\n\n[Note: the user attached a \
binary document, but the selected model cannot read binary input \
directly. Rely on the pasted text above; if there is none, tell the user \
to transcribe the document into text.]";

pub fn chat_system_prompt() -> String {
    format!("{SYSTEM_INSTRUCTION}\n{JSON_SHAPE_EXAMPLE}")
}

/// The user-role message: a fixed request plus the pasted documentation.
pub fn user_prompt(documentation: &str) -> String {
    let mut prompt =
        String::from("Analyze the documentation and produce a detailed test plan.");
    if !documentation.is_empty() {
        prompt.push_str("\n\nDocumentation:\n");
        prompt.push_str(documentation);
    }
    prompt
}

/// Structured-output schema for Gemini's `generateContent` call,
/// mirroring the test-plan shape with body/headers as JSON strings.
pub fn gemini_response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "config": {
                "type": "OBJECT",
                "properties": {
                    "baseUrl": { "type": "STRING" },
                    "authHeader": { "type": "STRING" },
                    "authToken": { "type": "STRING" }
                }
            },
            "cases": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "id": { "type": "STRING" },
                        "title": { "type": "STRING" },
                        "description": { "type": "STRING" },
                        "method": {
                            "type": "STRING",
                            "enum": ["GET", "POST", "PUT", "DELETE", "PATCH"]
                        },
                        "endpoint": { "type": "STRING" },
                        "headers": { "type": "STRING" },
                        "body": { "type": "STRING" },
                        "expectedStatus": { "type": "INTEGER" }
                    },
                    "required": ["id", "title", "method", "endpoint", "expectedStatus", "body"]
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prompt_embeds_documentation() {
        let prompt = user_prompt("GET /users returns 200");
        assert!(prompt.contains("Documentation:"));
        assert!(prompt.contains("GET /users returns 200"));
        assert!(!user_prompt("").contains("Documentation:"));
    }

    #[test]
    fn chat_prompt_carries_shape_example() {
        let prompt = chat_system_prompt();
        assert!(prompt.contains("expectedStatus"));
        assert!(prompt.contains("pure JSON"));
    }

    #[test]
    fn schema_requires_core_case_fields() {
        let schema = gemini_response_schema();
        let required = schema["properties"]["cases"]["items"]["required"]
            .as_array()
            .unwrap();
        assert!(required.iter().any(|v| v == "expectedStatus"));
        assert!(required.iter().any(|v| v == "endpoint"));
    }
}
