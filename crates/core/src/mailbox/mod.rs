//! Outbound mail through a linked mailbox account.

mod gmail;
mod message;

pub use gmail::GmailMailbox;
pub use message::{encode_subject, html_body, OutgoingEmail};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::retry::Retryable;
use crate::session::SenderCredential;

#[derive(Debug, Error)]
pub enum MailboxError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Mailbox API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Cannot build message: {0}")]
    InvalidMessage(String),
}

impl Retryable for MailboxError {
    fn status_code(&self) -> Option<u16> {
        match self {
            MailboxError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Provider receipt for a sent message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// Sends one email on behalf of a sender credential.
#[async_trait]
pub trait Mailbox: Send + Sync {
    fn name(&self) -> &str;

    async fn send(
        &self,
        sender: &SenderCredential,
        message: &OutgoingEmail,
    ) -> Result<SentMessage, MailboxError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailboxProvider {
    #[default]
    Gmail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxConfig {
    #[serde(default)]
    pub provider: MailboxProvider,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u32,
}

fn default_api_base() -> String {
    "https://gmail.googleapis.com".to_string()
}

fn default_timeout_secs() -> u32 {
    30
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            provider: MailboxProvider::default(),
            api_base: default_api_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

pub fn create_mailbox(config: &MailboxConfig) -> Arc<dyn Mailbox> {
    match config.provider {
        MailboxProvider::Gmail => Arc::new(
            GmailMailbox::new(config.timeout_secs).with_api_base(config.api_base.clone()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        let busy = MailboxError::Api {
            status: 429,
            message: "rate limited".to_string(),
        };
        assert!(busy.is_retryable());

        let denied = MailboxError::Api {
            status: 403,
            message: "insufficient scope".to_string(),
        };
        assert!(!denied.is_retryable());
        assert!(!MailboxError::Http("connection reset".to_string()).is_retryable());
    }

    #[test]
    fn test_config_defaults_from_toml() {
        let config: MailboxConfig = toml::from_str("").unwrap();
        assert_eq!(config.provider, MailboxProvider::Gmail);
        assert_eq!(config.api_base, "https://gmail.googleapis.com");
        assert_eq!(config.timeout_secs, 30);
    }
}
