use super::{types::Config, AuthMethod, ConfigError};

/// Validate configuration
///
/// Catches what serde cannot: missing secrets for the selected methods and
/// ranges that would make the loops misbehave.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.auth.method == AuthMethod::ApiKey
        && config.auth.api_key.as_deref().is_none_or(str::is_empty)
    {
        return Err(ConfigError::ValidationError(
            "auth.api_key must be set when auth.method = \"api_key\"".to_string(),
        ));
    }

    if config.llm.provider.requires_api_key()
        && config.llm.api_key.as_deref().is_none_or(str::is_empty)
    {
        return Err(ConfigError::ValidationError(format!(
            "llm.api_key is required for provider '{}'",
            config.llm.provider.as_str()
        )));
    }

    if config.retry.max_retries == 0 {
        return Err(ConfigError::ValidationError(
            "retry.max_retries must be at least 1".to_string(),
        ));
    }

    if config.dispatch.min_delay_secs > config.dispatch.max_delay_secs {
        return Err(ConfigError::ValidationError(format!(
            "dispatch.min_delay_secs ({}) exceeds dispatch.max_delay_secs ({})",
            config.dispatch.min_delay_secs, config.dispatch.max_delay_secs
        )));
    }

    if config.pipeline.max_leads == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.max_leads must be at least 1".to_string(),
        ));
    }

    Ok(())
}
