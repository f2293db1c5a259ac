//! Session, sender profile and sender credential types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the sending company says about itself; used to personalize drafts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderProfile {
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub sector: String,
    /// The pitch: what the sender offers and why it matters.
    #[serde(default)]
    pub value_proposition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Name used to sign outreach emails.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Health of a linked mailbox, as last reported. Rotation does not consult it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SenderStatus {
    #[default]
    Active,
    Cooldown,
    Failed,
}

/// A linked mailbox used to send outreach.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderCredential {
    pub id: String,
    pub email: String,
    pub access_token: String,
    #[serde(default)]
    pub status: SenderStatus,
    #[serde(default)]
    pub usage_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

impl SenderCredential {
    pub fn new(email: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.into(),
            access_token: access_token.into(),
            status: SenderStatus::Active,
            usage_count: 0,
            last_used_at: None,
        }
    }
}

impl std::fmt::Debug for SenderCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SenderCredential")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("access_token", &"<redacted>")
            .field("status", &self.status)
            .field("usage_count", &self.usage_count)
            .field("last_used_at", &self.last_used_at)
            .finish()
    }
}

/// The per-user state the pipeline and the dispatch loop read and mutate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    #[serde(default)]
    pub profile: SenderProfile,
    /// Remaining enrichment credits.
    #[serde(default)]
    pub quota: u32,
    /// Index of the sender whose turn is next (taken modulo pool size).
    #[serde(default)]
    pub rotation_cursor: usize,
    #[serde(default)]
    pub senders: Vec<SenderCredential>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, profile: SenderProfile, quota: u32) -> Self {
        Self {
            user_id: user_id.into(),
            profile,
            quota,
            rotation_cursor: 0,
            senders: Vec::new(),
        }
    }
}

/// Change notification for persistence and live views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    QuotaChanged { quota: u32 },
    CursorAdvanced { cursor: usize },
    SendersChanged { count: usize },
    ProfileChanged,
}
