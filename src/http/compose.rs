//! The request composer: a pure function from a test case plus the
//! session configuration to the effective URL, header set and body of
//! one HTTP call.
//!
//! One consistent precedence rule across all three override sets: last
//! write wins, and a global entry always beats whatever the generated
//! case (or the default) put there. Override sets exist so a human can
//! inject real secrets and operational metadata that the model could
//! only guess as placeholders.

use std::collections::HashMap;

use reqwest::Url;
use serde_json::{Map, Value};

use crate::config::{ApiConfig, DEFAULT_AUTH_HEADER, enabled_entries};
use crate::domain::TestCase;

const BEARER_PREFIX: &str = "Bearer ";

/// The final request actually sent, after all override layers are
/// merged.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
    /// `None` means the request carries no body at all.
    pub body: Option<Value>,
}

pub fn effective_request(case: &TestCase, config: &ApiConfig) -> EffectiveRequest {
    EffectiveRequest {
        url: compose_url(case, config),
        headers: compose_headers(case, config),
        body: compose_body(case, config),
    }
}

/// Join base and endpoint with a single slash, then apply enabled global
/// query params with set semantics: a global param overwrites any
/// same-named parameter already embedded in the endpoint's query string.
///
/// When the joined string is not an absolute URL, fall back to plain
/// query-string concatenation. The fallback appends without
/// deduplicating keys already present in the endpoint — a documented
/// limitation of the degraded path, kept for compatibility.
fn compose_url(case: &TestCase, config: &ApiConfig) -> String {
    let base = config.base_url.strip_suffix('/').unwrap_or(&config.base_url);
    let endpoint = case.endpoint.strip_prefix('/').unwrap_or(&case.endpoint);
    let joined = format!("{base}/{endpoint}");

    match Url::parse(&joined) {
        Ok(mut url) => {
            let mut pairs: Vec<(String, String)> = url
                .query_pairs()
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
                .collect();
            for entry in enabled_entries(&config.global_query_params) {
                set_query_pair(&mut pairs, &entry.key, &entry.value);
            }
            if pairs.is_empty() {
                url.set_query(None);
            } else {
                let mut editor = url.query_pairs_mut();
                editor.clear();
                editor.extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
                drop(editor);
            }
            url.to_string()
        }
        Err(_) => append_query_fallback(joined, config),
    }
}

/// Set semantics on an ordered pair list: replace the first occurrence
/// in place, drop any later duplicates, append when absent.
fn set_query_pair(pairs: &mut Vec<(String, String)>, key: &str, value: &str) {
    let mut replaced = false;
    pairs.retain_mut(|(existing_key, existing_value)| {
        if existing_key != key {
            return true;
        }
        if replaced {
            return false;
        }
        *existing_value = value.to_string();
        replaced = true;
        true
    });
    if !replaced {
        pairs.push((key.to_string(), value.to_string()));
    }
}

fn append_query_fallback(mut url: String, config: &ApiConfig) -> String {
    let query = {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for entry in enabled_entries(&config.global_query_params) {
            serializer.append_pair(&entry.key, &entry.value);
        }
        serializer.finish()
    };
    if query.is_empty() {
        return url;
    }
    url.push(if url.contains('?') { '&' } else { '?' });
    url.push_str(&query);
    url
}

/// Layering order: JSON content-type default, then the case's own
/// headers, then enabled global headers, then the auth header last so it
/// always wins over a colliding name.
fn compose_headers(case: &TestCase, config: &ApiConfig) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert("Content-Type".to_string(), "application/json".to_string());

    if let Some(case_headers) = &case.headers {
        for (key, value) in case_headers {
            headers.insert(key.clone(), value.clone());
        }
    }
    for entry in enabled_entries(&config.global_headers) {
        headers.insert(entry.key.clone(), entry.value.clone());
    }

    if !config.auth_token.is_empty() {
        let name = if config.auth_header.is_empty() {
            DEFAULT_AUTH_HEADER
        } else {
            config.auth_header.as_str()
        };
        // Verbatim when the token already carries the scheme or the
        // header is a custom one; the Bearer prefix only applies to the
        // standard Authorization header.
        let value = if config.auth_token.starts_with(BEARER_PREFIX) || name != DEFAULT_AUTH_HEADER
        {
            config.auth_token.clone()
        } else {
            format!("{BEARER_PREFIX}{}", config.auth_token)
        };
        headers.insert(name.to_string(), value);
    }

    headers
}

/// Body methods only. The case body (when it is an object) is shallow-
/// copied, enabled global body params overwrite same-named fields, and
/// an empty result means the request carries no body at all.
fn compose_body(case: &TestCase, config: &ApiConfig) -> Option<Value> {
    if !case.method.takes_body() {
        return None;
    }

    let mut merged: Map<String, Value> = match &case.body {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    for entry in enabled_entries(&config.global_body_params) {
        merged.insert(entry.key.clone(), Value::String(entry.value.clone()));
    }

    if merged.is_empty() {
        None
    } else {
        Some(Value::Object(merged))
    }
}
