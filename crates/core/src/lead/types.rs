//! Lead record types.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

/// Placeholder used for contact fields that enrichment has not filled yet.
pub const PLACEHOLDER: &str = "-";

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// Returns true if the address looks like `local@domain.tld`.
pub fn is_plausible_email(address: &str) -> bool {
    EMAIL_RE.is_match(address.trim())
}

/// Enrichment progress of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        }
    }
}

/// Outreach progress of a lead. Independent of [`ProcessingStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationStatus {
    #[default]
    Idle,
    Queued,
    Sending,
    Sent,
    Failed,
}

impl AutomationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AutomationStatus::Idle => "idle",
            AutomationStatus::Queued => "queued",
            AutomationStatus::Sending => "sending",
            AutomationStatus::Sent => "sent",
            AutomationStatus::Failed => "failed",
        }
    }
}

/// Sales funnel position, set once outreach happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunnelStatus {
    Waiting,
    Contacted,
    Replied,
}

/// Social profile links found during enrichment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLinks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
}

impl SocialLinks {
    pub fn is_empty(&self) -> bool {
        self.linkedin.is_none() && self.instagram.is_none() && self.twitter.is_none()
    }
}

/// A prospective company tracked through discovery, enrichment and outreach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub name: String,
    pub website: String,
    pub phone: String,
    pub email: String,
    pub industry: String,
    pub location: String,
    pub status: ProcessingStatus,
    pub automation: AutomationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_draft: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icebreaker: Option<String>,
    #[serde(default, skip_serializing_if = "SocialLinks::is_empty")]
    pub social: SocialLinks,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competitor_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funnel: Option<FunnelStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    /// Create a freshly extracted lead: `pending`, `idle`, contacts unknown.
    pub fn provisional(
        name: impl Into<String>,
        website: Option<String>,
        location: impl Into<String>,
        industry: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            website: website.unwrap_or_else(|| PLACEHOLDER.to_string()),
            phone: PLACEHOLDER.to_string(),
            email: PLACEHOLDER.to_string(),
            industry: industry.into(),
            location: location.into(),
            status: ProcessingStatus::Pending,
            automation: AutomationStatus::Idle,
            email_subject: None,
            email_draft: None,
            icebreaker: None,
            social: SocialLinks::default(),
            rating: None,
            competitor_notes: None,
            funnel: None,
            sent_at: None,
            created_at: Utc::now(),
        }
    }

    /// Whether the dispatch loop may pick this lead up.
    pub fn is_dispatchable(&self) -> bool {
        self.automation == AutomationStatus::Queued && is_plausible_email(&self.email)
    }

    /// Website usable in prompts, `None` while it is still the placeholder.
    pub fn known_website(&self) -> Option<&str> {
        let website = self.website.trim();
        if website.is_empty() || website == PLACEHOLDER {
            None
        } else {
            Some(website)
        }
    }
}

/// A partial lead. Merging sets only the fields that are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ProcessingStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automation: Option<AutomationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_draft: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icebreaker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competitor_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funnel: Option<FunnelStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
}

impl LeadPatch {
    pub fn status(status: ProcessingStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn automation(automation: AutomationStatus) -> Self {
        Self {
            automation: Some(automation),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: ProcessingStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// True when no field is set (a degraded enrichment result).
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply every present field onto `lead`.
    pub fn apply_to(&self, lead: &mut Lead) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *target = v.clone();
            }
        }
        fn set_opt<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                *target = value.clone();
            }
        }

        set(&mut lead.website, &self.website);
        set(&mut lead.phone, &self.phone);
        set(&mut lead.email, &self.email);
        set(&mut lead.industry, &self.industry);
        set(&mut lead.location, &self.location);
        set(&mut lead.status, &self.status);
        set(&mut lead.automation, &self.automation);
        set_opt(&mut lead.email_subject, &self.email_subject);
        set_opt(&mut lead.email_draft, &self.email_draft);
        set_opt(&mut lead.icebreaker, &self.icebreaker);
        set_opt(&mut lead.social.linkedin, &self.linkedin);
        set_opt(&mut lead.social.instagram, &self.instagram);
        set_opt(&mut lead.social.twitter, &self.twitter);
        set_opt(&mut lead.rating, &self.rating);
        set_opt(&mut lead.competitor_notes, &self.competitor_notes);
        set_opt(&mut lead.funnel, &self.funnel);
        set_opt(&mut lead.sent_at, &self.sent_at);
    }
}
