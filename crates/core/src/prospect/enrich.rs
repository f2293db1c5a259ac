//! LLM-backed lead enrichment: contact details, social profiles and a
//! personalized outreach draft.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::lead::{is_plausible_email, LeadPatch, PLACEHOLDER};
use crate::llm::{extract_json, CompletionRequest, LlmClient};
use crate::metrics::record_llm_usage;
use crate::retry::{with_retry, RetryPolicy};

use super::types::EnrichmentRequest;
use super::{LeadEnricher, ProspectError, RetryObserver};

#[derive(Debug, Clone)]
pub struct EnricherConfig {
    pub max_tokens: u32,
    pub temperature: f32,
    /// Let the provider ground the research with live web search.
    pub web_search: bool,
    pub retry: RetryPolicy,
}

impl Default for EnricherConfig {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            temperature: 0.7,
            web_search: true,
            retry: RetryPolicy::default(),
        }
    }
}

pub struct LlmLeadEnricher {
    client: Arc<dyn LlmClient>,
    config: EnricherConfig,
    observer: Option<RetryObserver>,
}

impl LlmLeadEnricher {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            config: EnricherConfig::default(),
            observer: None,
        }
    }

    pub fn with_config(client: Arc<dyn LlmClient>, config: EnricherConfig) -> Self {
        Self {
            client,
            config,
            observer: None,
        }
    }

    pub fn with_retry_observer(mut self, observer: RetryObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    fn build_system_prompt(&self) -> String {
        r#"You research companies and write first-touch B2B outreach emails.

Respond ONLY with JSON. Every key is optional; omit what you cannot verify:
{
  "email": "<public contact email>",
  "phone": "<phone number>",
  "industry": "<short industry label>",
  "linkedin": "<url>", "instagram": "<url>", "twitter": "<url>",
  "rating": <public review score 0-5>,
  "competitorNotes": "<one sentence on their market position>",
  "icebreaker": "<one personal opening line about the company>",
  "emailSubject": "<subject line>",
  "emailDraft": "<email body, plain text with line breaks>"
}

Write the email in the language of the recipient's location. Never invent contact details."#
            .to_string()
    }

    fn build_user_prompt(&self, request: &EnrichmentRequest) -> String {
        let mut prompt = String::new();

        prompt.push_str("TARGET COMPANY:\n");
        prompt.push_str(&format!("Name: {}\n", request.name));
        if let Some(website) = &request.website {
            prompt.push_str(&format!("Website: {}\n", website));
        }
        if !request.location.is_empty() {
            prompt.push_str(&format!("Location: {}\n", request.location));
        }
        if !request.sector.is_empty() {
            prompt.push_str(&format!("Sector: {}\n", request.sector));
        }

        let profile = &request.profile;
        prompt.push_str("\nSENDER:\n");
        if !profile.company_name.is_empty() {
            prompt.push_str(&format!("Company: {}\n", profile.company_name));
        }
        if !profile.sector.is_empty() {
            prompt.push_str(&format!("Sector: {}\n", profile.sector));
        }
        if !profile.value_proposition.is_empty() {
            prompt.push_str(&format!("Offer: {}\n", profile.value_proposition));
        }
        if let Some(website) = &profile.website {
            prompt.push_str(&format!("Website: {}\n", website));
        }
        if let Some(signature) = &profile.signature {
            prompt.push_str(&format!("Sign the email as: {}\n", signature));
        }

        prompt.push_str("\nFind the company's contact details and draft the outreach email.");
        prompt
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnrichmentResponse {
    email: Option<String>,
    phone: Option<String>,
    industry: Option<String>,
    linkedin: Option<String>,
    instagram: Option<String>,
    twitter: Option<String>,
    rating: Option<f32>,
    competitor_notes: Option<String>,
    icebreaker: Option<String>,
    email_subject: Option<String>,
    email_draft: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != PLACEHOLDER)
}

/// Parse a model reply into a patch. Anything unparseable yields an empty patch.
pub(crate) fn parse_enrichment(text: &str) -> LeadPatch {
    let parsed: EnrichmentResponse = match serde_json::from_str(extract_json(text)) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!(error = %e, "Unparseable enrichment response, treating as empty");
            return LeadPatch::default();
        }
    };

    LeadPatch {
        email: present(parsed.email).filter(|e| is_plausible_email(e)),
        phone: present(parsed.phone),
        industry: present(parsed.industry),
        linkedin: present(parsed.linkedin),
        instagram: present(parsed.instagram),
        twitter: present(parsed.twitter),
        rating: parsed.rating.filter(|r| r.is_finite()).map(|r| r.clamp(0.0, 5.0)),
        competitor_notes: present(parsed.competitor_notes),
        icebreaker: present(parsed.icebreaker),
        email_subject: present(parsed.email_subject),
        email_draft: present(parsed.email_draft),
        ..Default::default()
    }
}

#[async_trait]
impl LeadEnricher for LlmLeadEnricher {
    fn name(&self) -> &str {
        "llm"
    }

    async fn enrich(&self, request: &EnrichmentRequest) -> Result<LeadPatch, ProspectError> {
        let mut completion = CompletionRequest::new(self.build_user_prompt(request))
            .with_system(self.build_system_prompt())
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature)
            .with_json_output();
        if self.config.web_search {
            completion = completion.with_web_search();
        }

        let observer = self.observer.clone();
        let response = with_retry(
            &self.config.retry,
            || self.client.complete(completion.clone()),
            |notice| {
                if let Some(observer) = &observer {
                    observer(notice);
                }
            },
        )
        .await?;

        record_llm_usage(self.client.provider(), &response.usage);

        let patch = parse_enrichment(&response.text);
        debug!(company = %request.name, empty = patch.is_empty(), "Enrichment parsed");
        Ok(patch)
    }
}
