//! AI backend abstraction: turns pasted/uploaded API documentation into a
//! structured test plan via one of several model providers.
//!
//! Gemini gets a schema-constrained multimodal call; every other provider
//! speaks the OpenAI-compatible chat-completions convention with the JSON
//! shape embedded in the system prompt.

pub mod chat;
pub mod gemini;
pub mod normalize;
pub mod prompt;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::config::ImportedFile;
use crate::domain::GeneratedTestPlan;
use crate::telemetry;

pub const GEMINI_DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Supported AI backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    Gemini,
    DeepSeek,
    Tongyi,
    OpenAi,
}

impl AiProvider {
    pub fn default_base_url(self) -> &'static str {
        match self {
            AiProvider::Gemini => GEMINI_DEFAULT_BASE_URL,
            AiProvider::DeepSeek => "https://api.deepseek.com",
            AiProvider::Tongyi => "https://dashscope.aliyuncs.com/compatible-mode/v1",
            AiProvider::OpenAi => "https://api.openai.com/v1",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            AiProvider::Gemini => GEMINI_DEFAULT_MODEL,
            AiProvider::DeepSeek => "deepseek-chat",
            AiProvider::Tongyi => "qwen-plus",
            AiProvider::OpenAi => "gpt-4o-mini",
        }
    }
}

impl std::fmt::Display for AiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AiProvider::Gemini => "gemini",
            AiProvider::DeepSeek => "deepseek",
            AiProvider::Tongyi => "tongyi",
            AiProvider::OpenAi => "openai",
        };
        write!(f, "{label}")
    }
}

/// AI backend settings. The key is held in memory for the session only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiConfig {
    #[serde(default = "default_provider")]
    pub provider: AiProvider,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub model_name: String,
}

fn default_provider() -> AiProvider {
    AiProvider::Gemini
}

impl Default for AiConfig {
    fn default() -> Self {
        let provider = default_provider();
        Self {
            provider,
            api_key: String::new(),
            base_url: provider.default_base_url().to_string(),
            model_name: provider.default_model().to_string(),
        }
    }
}

impl AiConfig {
    /// Switch to another provider. Base URL and model name are always
    /// reset to the new provider's defaults, discarding any
    /// customization.
    pub fn switch_provider(&mut self, provider: AiProvider) {
        self.provider = provider;
        self.base_url = provider.default_base_url().to_string();
        self.model_name = provider.default_model().to_string();
    }
}

/// Generate a test plan from documentation text and an optional imported
/// file. Fatal on configuration errors, provider HTTP failures and
/// unrecoverable model output; per-case malformations degrade inside the
/// normalizer instead.
pub async fn generate_test_plan(
    documentation: &str,
    imported_file: Option<&ImportedFile>,
    ai: &AiConfig,
) -> Result<GeneratedTestPlan> {
    if ai.api_key.is_empty() {
        bail!("AI API key is not configured");
    }

    let raw = match ai.provider {
        AiProvider::Gemini => gemini::generate(ai, documentation, imported_file).await?,
        _ => chat::generate(ai, documentation, imported_file).await?,
    };
    telemetry::log_event(
        "ai",
        &format!("{} returned {} bytes of raw plan text", ai.provider, raw.len()),
    );

    normalize::parse_plan(&raw)
}
