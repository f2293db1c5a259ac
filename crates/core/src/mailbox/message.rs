//! RFC 822 message assembly.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;

use crate::lead::{is_plausible_email, Lead};

use super::MailboxError;

/// A rendered outreach email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    /// HTML body.
    pub body: String,
}

impl OutgoingEmail {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Render the lead's drafted email. Fails when there is nothing to send.
    pub fn from_lead(lead: &Lead) -> Result<Self, MailboxError> {
        if !is_plausible_email(&lead.email) {
            return Err(MailboxError::InvalidMessage(format!(
                "no valid recipient for {}",
                lead.name
            )));
        }
        let draft = lead
            .email_draft
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| {
                MailboxError::InvalidMessage(format!("no email draft for {}", lead.name))
            })?;
        let subject = lead
            .email_subject
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(lead.name.as_str());

        Ok(Self::new(lead.email.trim(), subject, html_body(draft)))
    }

    /// Full RFC 822 text with CRLF line endings.
    pub fn to_rfc822(&self) -> String {
        [
            format!("To: {}", self.to),
            format!("Subject: {}", encode_subject(&self.subject)),
            "MIME-Version: 1.0".to_string(),
            "Content-Type: text/html; charset=utf-8".to_string(),
            String::new(),
            self.body.clone(),
        ]
        .join("\r\n")
    }

    /// The message as the base64url `raw` payload mail APIs expect.
    pub fn to_raw(&self) -> String {
        URL_SAFE.encode(self.to_rfc822())
    }
}

/// RFC 2047 encoded-word for non-ASCII subjects; ASCII passes through.
pub fn encode_subject(subject: &str) -> String {
    let subject: String = subject.chars().filter(|c| *c != '\r' && *c != '\n').collect();
    if subject.is_ascii() {
        subject
    } else {
        format!("=?utf-8?B?{}?=", STANDARD.encode(subject.as_bytes()))
    }
}

/// Turn a draft into an HTML body. Drafts that already carry markup are kept;
/// plain text is escaped and its line breaks become `<br>`.
pub fn html_body(draft: &str) -> String {
    let looks_like_html = ["<br", "<p", "<div", "</"]
        .iter()
        .any(|tag| draft.to_lowercase().contains(tag));
    if looks_like_html {
        return draft.to_string();
    }

    draft
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace("\r\n", "\n")
        .replace('\n', "<br>")
}
