//! LLM client configuration.

use serde::{Deserialize, Serialize};

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// Google Gemini (generative language API).
    #[default]
    Gemini,
    /// Anthropic Claude API.
    Anthropic,
    /// Local Ollama instance.
    Ollama,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "gemini",
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::Ollama => "ollama",
        }
    }

    /// Hosted providers refuse requests without a key.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, LlmProvider::Ollama)
    }
}

/// LLM client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    /// Model name/identifier.
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Custom API base URL (for proxies or self-hosted).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    #[serde(default = "default_max_tokens")]
    /// Output budget for enrichment calls.
    pub max_tokens: u32,
    /// Sampling temperature for enrichment drafts.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_timeout() -> u32 {
    60
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: default_model(),
            api_key: None,
            api_base: None,
            timeout_secs: default_timeout(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl LlmConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("llm.model cannot be empty".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!(
                "llm.temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            ));
        }
        if self.timeout_secs == 0 {
            return Err("llm.timeout_secs cannot be 0".to_string());
        }
        Ok(())
    }

    /// Returns the API key when it is set and non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LlmConfig::default();
        assert_eq!(config.provider, LlmProvider::Gemini);
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.timeout_secs, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize() {
        let toml = r#"
provider = "anthropic"
model = "claude-3-haiku-20240307"
api_key = "sk-test"
"#;
        let config: LlmConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.provider, LlmProvider::Anthropic);
        assert_eq!(config.api_key(), Some("sk-test"));
        assert_eq!(config.max_tokens, 2048);
    }

    #[test]
    fn test_blank_api_key_is_absent() {
        let config = LlmConfig {
            api_key: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(config.api_key().is_none());
    }

    #[test]
    fn test_validate_rejects_empty_model() {
        let config = LlmConfig {
            model: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ollama_needs_no_key() {
        assert!(!LlmProvider::Ollama.requires_api_key());
        assert!(LlmProvider::Gemini.requires_api_key());
        assert!(LlmProvider::Anthropic.requires_api_key());
    }
}
