use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::dispatch::DispatchConfig;
use crate::llm::LlmConfig;
use crate::mailbox::MailboxConfig;
use crate::pipeline::PipelineConfig;
use crate::retry::RetryPolicy;
use crate::session::SenderProfile;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub mailbox: MailboxConfig,
    /// Shared by LLM calls and mailbox sends.
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Required when `method = "api_key"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    ApiKey,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::None => "none",
            AuthMethod::ApiKey => "api_key",
        }
    }
}

/// Where the local state (session, leads) is persisted.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("prospector.db")
}

/// Seed values for a session that has never been persisted.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default = "default_initial_quota")]
    pub initial_quota: u32,
    #[serde(default)]
    pub profile: SenderProfile,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            initial_quota: default_initial_quota(),
            profile: SenderProfile::default(),
        }
    }
}

fn default_user_id() -> String {
    "local".to_string()
}

fn default_initial_quota() -> u32 {
    100
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub llm: SanitizedLlmConfig,
    pub mailbox: MailboxConfig,
    pub retry: RetryPolicy,
    pub pipeline: PipelineConfig,
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
}

/// LLM config with the API key hidden.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedLlmConfig {
    pub provider: String,
    pub model: String,
    pub api_key_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: config.auth.method.as_str().to_string(),
            },
            server: config.server.clone(),
            database: config.database.clone(),
            llm: SanitizedLlmConfig {
                provider: config.llm.provider.as_str().to_string(),
                model: config.llm.model.clone(),
                api_key_configured: config
                    .llm
                    .api_key
                    .as_deref()
                    .is_some_and(|k| !k.is_empty()),
                api_base: config.llm.api_base.clone(),
                timeout_secs: config.llm.timeout_secs,
            },
            mailbox: config.mailbox.clone(),
            retry: config.retry.clone(),
            pipeline: config.pipeline.clone(),
            dispatch: config.dispatch.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmProvider;

    #[test]
    fn test_deserialize_minimal_config() {
        let toml = r#"
[auth]
method = "none"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.auth.method, AuthMethod::None);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.database.path.to_str().unwrap(), "prospector.db");
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.initial_delay_ms, 4000);
        assert_eq!(config.pipeline.pacing_delay_ms, 150);
        assert_eq!(config.dispatch.min_delay_secs, 420);
        assert_eq!(config.dispatch.max_delay_secs, 540);
        assert_eq!(config.dispatch.failure_delay_secs, 60);
        assert_eq!(config.session.user_id, "local");
        assert_eq!(config.session.initial_quota, 100);
    }

    #[test]
    fn test_deserialize_missing_auth_fails() {
        let toml = r#"
[server]
port = 8080
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[auth]
method = "api_key"
api_key = "s3cret"

[llm]
provider = "anthropic"
model = "claude-sonnet"
api_key = "llm-key"

[retry]
max_retries = 5
initial_delay_ms = 1000

[dispatch]
min_delay_secs = 10
max_delay_secs = 20

[session]
user_id = "ayse"
initial_quota = 25

[session.profile]
company_name = "Kod Atölyesi"
sector = "Yazılım"
value_proposition = "Hızlı MVP geliştirme"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.auth.method, AuthMethod::ApiKey);
        assert_eq!(config.auth.api_key.as_deref(), Some("s3cret"));
        assert_eq!(config.llm.provider, LlmProvider::Anthropic);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.dispatch.min_delay_secs, 10);
        assert_eq!(config.dispatch.failure_delay_secs, 60);
        assert_eq!(config.session.user_id, "ayse");
        assert_eq!(config.session.profile.company_name, "Kod Atölyesi");
    }

    #[test]
    fn test_sanitized_config_hides_secrets() {
        let toml = r#"
[auth]
method = "api_key"
api_key = "s3cret"

[llm]
api_key = "llm-key"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);
        assert_eq!(sanitized.auth.method, "api_key");
        assert_eq!(sanitized.llm.provider, "gemini");
        assert!(sanitized.llm.api_key_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("s3cret"));
        assert!(!json.contains("llm-key"));
    }
}
