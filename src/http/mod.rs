//! Request composition and execution.

pub mod compose;
pub mod dispatch;
pub mod proxy;

use std::collections::HashMap;

use anyhow::{Result, anyhow};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// Build a reqwest header map from merged string pairs. Empty keys are
/// skipped; an invalid name or value fails the whole request.
pub(crate) fn build_header_map(input: &HashMap<String, String>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (key, value) in input {
        if key.is_empty() {
            continue;
        }
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|err| anyhow!("invalid header name `{key}`: {err}"))?;
        let value = HeaderValue::from_str(value)
            .map_err(|err| anyhow!("invalid header value for `{key}`: {err}"))?;
        headers.insert(name, value);
    }
    Ok(headers)
}
