//! Testing utilities and mock implementations.
//!
//! Mocks for every external seam (LLM provider, extraction, enrichment,
//! mailbox), so the pipeline and dispatch loop can be exercised end to end
//! without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use prospector_core::testing::{MockExtractor, MockEnricher, fixtures};
//!
//! let extractor = MockExtractor::returning(fixtures::extracted(3));
//! let enricher = MockEnricher::new();
//! enricher.fail_for("Company 2");
//!
//! // Build an EnrichmentPipeline with them...
//! ```

mod mock_llm;
mod mock_mailbox;
mod mock_prospect;

pub use mock_llm::MockLlmClient;
pub use mock_mailbox::{MockMailbox, RecordedSend};
pub use mock_prospect::{MockEnricher, MockExtractor};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::lead::{AutomationStatus, Lead, LeadPatch, ProcessingStatus};
    use crate::prospect::ExtractedLead;
    use crate::session::{SenderCredential, SenderProfile, Session};

    /// `n` extracted companies named "Company 0".."Company n-1".
    pub fn extracted(n: usize) -> Vec<ExtractedLead> {
        (0..n)
            .map(|i| ExtractedLead::new(format!("Company {}", i)))
            .collect()
    }

    /// An enriched lead queued for dispatch, with a drafted email.
    pub fn queued_lead(name: &str, email: &str) -> Lead {
        let mut lead = Lead::provisional(name, None, "İstanbul", "Yazılım");
        lead.status = ProcessingStatus::Completed;
        lead.automation = AutomationStatus::Queued;
        lead.email = email.to_string();
        lead.email_subject = Some(format!("{} için iş birliği", name));
        lead.email_draft = Some(format!("Merhaba {},\nSizinle tanışmak isteriz.", name));
        lead
    }

    /// What a successful enrichment of `name` looks like.
    pub fn enrichment_patch(name: &str) -> LeadPatch {
        let slug: String = name
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        LeadPatch {
            email: Some(format!("info@{}.com", slug)),
            phone: Some("+90 212 555 00 00".to_string()),
            icebreaker: Some(format!("{} has a great portfolio.", name)),
            email_subject: Some(format!("Hello {}", name)),
            email_draft: Some(format!("Hi {},\nLet's talk.", name)),
            ..Default::default()
        }
    }

    pub fn sender(email: &str) -> SenderCredential {
        SenderCredential::new(email, format!("token-{}", email))
    }

    pub fn session(quota: u32, senders: &[&str]) -> Session {
        let mut session = Session::new(
            "test-user",
            SenderProfile {
                company_name: "Prospector Ltd".to_string(),
                sector: "Marketing".to_string(),
                value_proposition: "More qualified meetings".to_string(),
                website: None,
                signature: None,
            },
            quota,
        );
        session.senders = senders.iter().map(|e| sender(e)).collect();
        session
    }
}
