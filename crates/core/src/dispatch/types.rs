//! Types for the dispatch loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mailbox::MailboxError;

use super::rotation::RotationError;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    NoSender(#[from] RotationError),

    #[error("send to lead {lead_id} failed: {source}")]
    Send {
        lead_id: String,
        #[source]
        source: MailboxError,
    },
}

/// Result of one dispatch attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent { lead_id: String, sender: String },
    /// No queued lead with a usable address.
    QueueEmpty,
    /// The picked lead disappeared before it could be claimed.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warn,
    Error,
}

/// One line of the user-facing dispatch log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchLogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
}

impl DispatchLogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            lead_id: None,
            sender: None,
        }
    }

    pub fn with_lead(mut self, lead_id: impl Into<String>) -> Self {
        self.lead_id = Some(lead_id.into());
        self
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }
}

/// Snapshot returned by `DispatchLoop::status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchStatus {
    pub running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run_at: Option<DateTime<Utc>>,
    /// Seconds until the next attempt; absent when stopped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countdown_secs: Option<u64>,
    pub sent_count: u64,
    pub failed_count: u64,
    pub queued_count: usize,
    pub sender_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Live notification for dashboards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchEvent {
    Log { entry: DispatchLogEntry },
    Started,
    Stopped,
    Scheduled { next_run_at: DateTime<Utc> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_entry_serialization_skips_empty_fields() {
        let entry = DispatchLogEntry::new(LogLevel::Info, "Queue empty");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["level"], "info");
        assert!(json.get("lead_id").is_none());

        let entry = entry.with_lead("l-1").with_sender("a@x.com");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["lead_id"], "l-1");
        assert_eq!(json["sender"], "a@x.com");
    }

    #[test]
    fn test_error_display() {
        let err = DispatchError::from(RotationError::EmptyPool);
        assert_eq!(err.to_string(), "no sender available: the sender pool is empty");
    }
}
