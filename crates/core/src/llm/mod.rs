//! LLM client abstraction and implementations.

mod anthropic;
mod config;
mod gemini;
mod ollama;

pub use anthropic::AnthropicClient;
pub use config::{LlmConfig, LlmProvider};
pub use gemini::GeminiClient;
pub use ollama::OllamaClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::retry::Retryable;

/// Error type for LLM operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Not configured: {0}")]
    NotConfigured(String),
}

impl Retryable for LlmError {
    fn status_code(&self) -> Option<u16> {
        match self {
            LlmError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Request for a completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System prompt (instructions for the model)
    pub system: Option<String>,
    /// User message
    pub prompt: String,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Temperature (0.0 = deterministic, 1.0 = creative)
    pub temperature: f32,
    /// Ask the provider for a JSON-only response when it supports it.
    pub json_output: bool,
    /// Allow the provider to ground the answer with live web search.
    pub web_search: bool,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_tokens: 1024,
            temperature: 0.0,
            json_output: false,
            web_search: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_json_output(mut self) -> Self {
        self.json_output = true;
        self
    }

    pub fn with_web_search(mut self) -> Self {
        self.web_search = true;
        self
    }
}

/// Response from a completion.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// The generated text
    pub text: String,
    pub usage: LlmUsage,
    /// Model used
    pub model: String,
}

/// Trait for LLM clients.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider name (e.g., "gemini", "anthropic", "ollama")
    fn provider(&self) -> &str;

    fn model(&self) -> &str;

    /// Send a completion request and get a text response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

/// Slice out the outermost JSON object from a model reply.
///
/// Models wrap JSON in code fences or prose despite instructions.
pub fn extract_json(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => text.trim(),
    }
}

/// Build an HTTP client with the configured timeout.
pub(crate) fn http_client(timeout_secs: u32) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs as u64))
        .build()
        .unwrap_or_default()
}

/// Map a reqwest transport error.
pub(crate) fn map_transport_error(e: reqwest::Error, timeout_secs: u32) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout(Duration::from_secs(timeout_secs as u64))
    } else {
        LlmError::Http(e.to_string())
    }
}

/// Create the configured LLM client.
///
/// Fails before any network call when a hosted provider has no API key.
pub fn create_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    let key = config.api_key();
    if config.provider.requires_api_key() && key.is_none() && config.api_base.is_none() {
        return Err(LlmError::NotConfigured(format!(
            "{} requires llm.api_key",
            config.provider.as_str()
        )));
    }
    let key = key.unwrap_or_default();

    let client: Arc<dyn LlmClient> = match config.provider {
        LlmProvider::Gemini => {
            let mut client = GeminiClient::new(key, &config.model, config.timeout_secs);
            if let Some(base) = &config.api_base {
                client = client.with_api_base(base);
            }
            Arc::new(client)
        }
        LlmProvider::Anthropic => {
            let mut client = AnthropicClient::new(key, &config.model, config.timeout_secs);
            if let Some(base) = &config.api_base {
                client = client.with_api_base(base);
            }
            Arc::new(client)
        }
        LlmProvider::Ollama => {
            let mut client = OllamaClient::new(&config.model, config.timeout_secs);
            if let Some(base) = &config.api_base {
                client = client.with_api_base(base);
            }
            Arc::new(client)
        }
    };
    Ok(client)
}
