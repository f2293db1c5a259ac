//! Optional API key gate in front of the HTTP API.
//!
//! There is a single local session, so authentication only decides whether a
//! caller may act on it; the resulting [`Identity`] names the session owner.

mod api_key;
mod none;

pub use api_key::ApiKeyAuthenticator;
pub use none::NoneAuthenticator;

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::net::IpAddr;
use thiserror::Error;

use crate::config::{AuthConfig, AuthMethod};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    NotAuthenticated,

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

/// What the authenticator sees of an incoming request.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    pub source_ip: IpAddr,
}

impl AuthRequest {
    pub fn new(source_ip: IpAddr) -> Self {
        Self {
            headers: HashMap::new(),
            source_ip,
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Who is calling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: String,
    pub method: &'static str,
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError>;

    fn method_name(&self) -> &'static str;
}

/// Build the authenticator selected in config. `user_id` is the session owner
/// reported for every accepted request.
pub fn create_authenticator(
    config: &AuthConfig,
    user_id: &str,
) -> Result<Box<dyn Authenticator>, AuthError> {
    match config.method {
        AuthMethod::None => Ok(Box::new(NoneAuthenticator::new(user_id))),
        AuthMethod::ApiKey => {
            let api_key = config
                .api_key
                .clone()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| {
                    AuthError::ConfigurationError(
                        "api_key must be set when using the api_key method".to_string(),
                    )
                })?;
            Ok(Box::new(ApiKeyAuthenticator::new(api_key, user_id)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_authenticator_none() {
        let config = AuthConfig {
            method: AuthMethod::None,
            api_key: None,
        };
        let auth = create_authenticator(&config, "local").unwrap();
        assert_eq!(auth.method_name(), "none");
    }

    #[test]
    fn test_create_authenticator_api_key() {
        let config = AuthConfig {
            method: AuthMethod::ApiKey,
            api_key: Some("secret-key".to_string()),
        };
        let auth = create_authenticator(&config, "local").unwrap();
        assert_eq!(auth.method_name(), "api_key");
    }

    #[test]
    fn test_create_authenticator_api_key_missing_key() {
        for api_key in [None, Some(String::new())] {
            let config = AuthConfig {
                method: AuthMethod::ApiKey,
                api_key,
            };
            let result = create_authenticator(&config, "local");
            assert!(matches!(result, Err(AuthError::ConfigurationError(_))));
        }
    }

    #[test]
    fn test_request_headers_are_lowercased() {
        let request = AuthRequest::new(IpAddr::from([127, 0, 0, 1]))
            .with_header("X-API-Key", "abc");
        assert_eq!(request.header("x-api-key"), Some("abc"));
    }
}
