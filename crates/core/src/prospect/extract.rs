//! LLM-backed lead extraction.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::llm::{extract_json, CompletionRequest, LlmClient};
use crate::metrics::record_llm_usage;
use crate::retry::{with_retry, RetryPolicy};

use super::types::{ExtractedLead, ExtractionRequest, QueryKind};
use super::{LeadExtractor, ProspectError, RetryObserver};

/// Most recent names sent to the model as an exclusion list.
pub const EXCLUDE_HISTORY_LIMIT: usize = 40;

/// Generation settings for extraction.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub max_tokens: u32,
    pub temperature: f32,
    pub retry: RetryPolicy,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.4,
            retry: RetryPolicy::default(),
        }
    }
}

/// Lists companies for a market description by prompting an LLM.
pub struct LlmLeadExtractor {
    client: Arc<dyn LlmClient>,
    config: ExtractorConfig,
    observer: Option<RetryObserver>,
}

impl LlmLeadExtractor {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            config: ExtractorConfig::default(),
            observer: None,
        }
    }

    pub fn with_config(client: Arc<dyn LlmClient>, config: ExtractorConfig) -> Self {
        Self {
            client,
            config,
            observer: None,
        }
    }

    /// Forward retry progress lines to `observer`.
    pub fn with_retry_observer(mut self, observer: RetryObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    fn build_system_prompt(&self) -> String {
        r#"You are a B2B market researcher. You list real, currently operating companies.

Respond ONLY with JSON in this exact format:
{"leads": [{"name": "<company name>", "website": "<https://... or empty>", "location": "<city, country or empty>"}]}

Rules:
- Never invent companies. If unsure, return fewer entries.
- Never repeat a company from the exclusion list.
- Leave website empty rather than guessing a domain."#
            .to_string()
    }

    fn build_user_prompt(&self, request: &ExtractionRequest, kind: QueryKind) -> String {
        let mut prompt = String::new();

        match kind {
            QueryKind::Url => {
                prompt.push_str("SOURCE PAGE:\n");
                prompt.push_str(&format!("{}\n\n", request.query.trim()));
                prompt.push_str(&format!(
                    "Read the companies listed on this page and return up to {} of them. \
                     Complete each entry's website and location from public sources.\n",
                    request.limit
                ));
            }
            QueryKind::Keyword => {
                prompt.push_str("TARGET MARKET:\n");
                prompt.push_str(&format!("{}\n", request.query.trim()));
                if !request.sector.is_empty() {
                    prompt.push_str(&format!("Sector: {}\n", request.sector));
                }
                if !request.location.is_empty() {
                    prompt.push_str(&format!("Location: {}\n", request.location));
                }
                prompt.push_str(&format!(
                    "\nList up to {} companies that match this market.\n",
                    request.limit
                ));
            }
        }

        let excluded = recent_exclusions(&request.exclude_names);
        if !excluded.is_empty() {
            prompt.push_str("\nALREADY KNOWN (exclude these):\n");
            for name in excluded {
                prompt.push_str(&format!("- {}\n", name));
            }
        }

        prompt
    }
}

/// The first [`EXCLUDE_HISTORY_LIMIT`] names; callers pass them newest first.
fn recent_exclusions(names: &[String]) -> &[String] {
    &names[..names.len().min(EXCLUDE_HISTORY_LIMIT)]
}

#[derive(Debug, Deserialize)]
struct ExtractionResponse {
    #[serde(default)]
    leads: Vec<RawLead>,
}

#[derive(Debug, Deserialize)]
struct RawLead {
    #[serde(default)]
    name: String,
    #[serde(default)]
    website: Option<String>,
    #[serde(default)]
    location: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != crate::lead::PLACEHOLDER)
}

/// Parse a model reply. Anything unparseable yields no leads.
pub(crate) fn parse_extraction(text: &str, request: &ExtractionRequest) -> Vec<ExtractedLead> {
    let parsed: ExtractionResponse = match serde_json::from_str(extract_json(text)) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!(error = %e, "Unparseable extraction response, treating as empty");
            return Vec::new();
        }
    };

    parsed
        .leads
        .into_iter()
        .filter_map(|raw| {
            let name = raw.name.trim().to_string();
            if name.is_empty() || request.is_excluded(&name) {
                return None;
            }
            Some(ExtractedLead {
                name,
                website: non_blank(raw.website),
                location: non_blank(raw.location),
            })
        })
        .take(request.limit)
        .collect()
}

#[async_trait]
impl LeadExtractor for LlmLeadExtractor {
    fn name(&self) -> &str {
        "llm"
    }

    async fn extract(
        &self,
        request: &ExtractionRequest,
    ) -> Result<Vec<ExtractedLead>, ProspectError> {
        if request.limit == 0 {
            return Ok(Vec::new());
        }

        let kind = request.kind();
        let mut completion = CompletionRequest::new(self.build_user_prompt(request, kind))
            .with_system(self.build_system_prompt())
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature)
            .with_json_output();
        if kind == QueryKind::Url {
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

        let leads = parse_extraction(&response.text, request);
        info!(
            query = %request.query,
            kind = kind.as_str(),
            extracted = leads.len(),
            "Extraction finished"
        );
        Ok(leads)
    }
}
