//! Session configuration: the target API settings, the three global
//! override sets, and the AI backend settings.
//!
//! Nothing here is persisted beyond the session; the CLI loads a config
//! file at startup and the runner works on a read-only snapshot.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ai::AiConfig;
use crate::domain::ExtractedConfig;

pub const DEFAULT_AUTH_HEADER: &str = "Authorization";

/// One entry of a named override set (headers, query params or body
/// params). Disabled entries are retained but excluded from
/// effective-request computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideEntry {
    pub id: String,
    pub key: String,
    pub value: String,
    pub enabled: bool,
}

impl OverrideEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            key: key.into(),
            value: value.into(),
            enabled: true,
        }
    }
}

/// Update an entry's key/value in place, addressed by id.
pub fn update_entry(set: &mut [OverrideEntry], id: &str, key: &str, value: &str) {
    if let Some(entry) = set.iter_mut().find(|entry| entry.id == id) {
        entry.key = key.to_string();
        entry.value = value.to_string();
    }
}

/// Flip an entry's enabled flag, addressed by id. The stored key/value
/// survive the toggle.
pub fn toggle_entry(set: &mut [OverrideEntry], id: &str) {
    if let Some(entry) = set.iter_mut().find(|entry| entry.id == id) {
        entry.enabled = !entry.enabled;
    }
}

/// Remove an entry, addressed by id.
pub fn remove_entry(set: &mut Vec<OverrideEntry>, id: &str) {
    set.retain(|entry| entry.id != id);
}

/// Entries that participate in effective-request computation, in set
/// order: enabled and with a non-empty key.
pub fn enabled_entries(set: &[OverrideEntry]) -> impl Iterator<Item = &OverrideEntry> {
    set.iter().filter(|entry| entry.enabled && !entry.key.is_empty())
}

/// A user-supplied documentation file forwarded to the model as inline
/// base64 data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedFile {
    pub name: String,
    pub mime_type: String,
    /// Base64-encoded file content.
    pub data: String,
}

/// Aggregate session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    #[serde(default, rename = "aiConfig")]
    pub ai: AiConfig,
    /// Target API base URL.
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub auth_token: String,
    #[serde(default = "default_auth_header")]
    pub auth_header: String,
    #[serde(default)]
    pub global_headers: Vec<OverrideEntry>,
    #[serde(default)]
    pub global_query_params: Vec<OverrideEntry>,
    /// Applied only to POST/PUT/PATCH/DELETE requests.
    #[serde(default)]
    pub global_body_params: Vec<OverrideEntry>,
    #[serde(default)]
    pub documentation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imported_file: Option<ImportedFile>,
    /// When true, requests are forwarded through the relay instead of
    /// being sent from this process.
    #[serde(default)]
    pub use_server_proxy: bool,
    #[serde(default)]
    pub proxy_url: String,
}

fn default_auth_header() -> String {
    DEFAULT_AUTH_HEADER.to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            ai: AiConfig::default(),
            base_url: String::new(),
            auth_token: String::new(),
            auth_header: default_auth_header(),
            global_headers: Vec::new(),
            global_query_params: Vec::new(),
            global_body_params: Vec::new(),
            documentation: String::new(),
            imported_file: None,
            use_server_proxy: false,
            proxy_url: String::new(),
        }
    }
}

impl ApiConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file `{}`", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file `{}`", path.display()))
    }

    /// Refuse generation before any network activity when the AI backend
    /// is not configured.
    pub fn ensure_ready_for_generation(&self) -> Result<()> {
        if self.ai.api_key.is_empty() {
            bail!("AI API key is not configured");
        }
        Ok(())
    }

    /// Refuse a suite run before any network activity when the target is
    /// not configured.
    pub fn ensure_ready_for_run(&self) -> Result<()> {
        if self.base_url.is_empty() {
            bail!("target base URL is not configured");
        }
        Ok(())
    }

    /// Seed empty fields from model-extracted hints. `base_url` and
    /// `auth_token` are filled only when currently empty; `auth_header`
    /// is applied only when extracted and different from the default.
    /// Returns the names of the fields that were filled.
    pub fn absorb_extracted(&mut self, extracted: &ExtractedConfig) -> Vec<&'static str> {
        let mut filled = Vec::new();
        if self.base_url.is_empty() {
            if let Some(base_url) = extracted.base_url.as_deref().filter(|s| !s.is_empty()) {
                self.base_url = base_url.to_string();
                filled.push("base URL");
            }
        }
        if self.auth_token.is_empty() {
            if let Some(token) = extracted.auth_token.as_deref().filter(|s| !s.is_empty()) {
                self.auth_token = token.to_string();
                filled.push("auth token");
            }
        }
        if let Some(header) = extracted.auth_header.as_deref() {
            if !header.is_empty() && header != DEFAULT_AUTH_HEADER {
                self.auth_header = header.to_string();
            }
        }
        filled
    }
}
