//! Gmail API mailbox.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::session::SenderCredential;

use super::{Mailbox, MailboxError, OutgoingEmail, SentMessage};

pub struct GmailMailbox {
    client: reqwest::Client,
    api_base: String,
    timeout_secs: u32,
}

impl GmailMailbox {
    pub fn new(timeout_secs: u32) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs as u64))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_base: "https://gmail.googleapis.com".to_string(),
            timeout_secs,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/gmail/v1/users/me/messages/send",
            self.api_base.trim_end_matches('/')
        )
    }
}

#[derive(Debug, Serialize)]
struct SendRequest {
    raw: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    thread_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GmailError {
    error: GmailErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GmailErrorDetail {
    message: String,
}

/// Provider message from an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<GmailError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

#[async_trait]
impl Mailbox for GmailMailbox {
    fn name(&self) -> &str {
        "gmail"
    }

    async fn send(
        &self,
        sender: &SenderCredential,
        message: &OutgoingEmail,
    ) -> Result<SentMessage, MailboxError> {
        let body = SendRequest {
            raw: message.to_raw(),
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&sender.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MailboxError::Timeout(Duration::from_secs(self.timeout_secs as u64))
                } else {
                    MailboxError::Http(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(MailboxError::Api {
                status,
                message: error_message(&text),
            });
        }

        let sent: SendResponse = response.json().await.unwrap_or(SendResponse {
            id: None,
            thread_id: None,
        });
        debug!(sender = %sender.email, to = %message.to, id = ?sent.id, "Gmail accepted message");

        Ok(SentMessage {
            id: sent.id,
            thread_id: sent.thread_id,
        })
    }
}
