//! Lead discovery and enrichment steps.
//!
//! Both steps are traits so the pipeline can run against any backend. The
//! LLM-backed implementations wrap each provider call in the retry wrapper and
//! degrade to an empty result when the model's reply cannot be parsed.

mod enrich;
mod extract;
mod types;

pub use enrich::{EnricherConfig, LlmLeadEnricher};
pub use extract::{ExtractorConfig, LlmLeadExtractor};
pub use types::{EnrichmentRequest, ExtractedLead, ExtractionRequest, QueryKind};

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::lead::LeadPatch;
use crate::llm::LlmError;
use crate::retry::{RetryNotice, Retryable};

/// Errors surfaced by a discovery or enrichment step.
#[derive(Debug, Error)]
pub enum ProspectError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Step failed: {0}")]
    Failed(String),
}

impl Retryable for ProspectError {
    fn status_code(&self) -> Option<u16> {
        match self {
            ProspectError::Llm(e) => e.status_code(),
            ProspectError::Failed(_) => None,
        }
    }
}

/// Callback receiving retry progress lines.
pub type RetryObserver = Arc<dyn Fn(&RetryNotice) + Send + Sync>;

/// Enumerates candidate companies for a market description.
#[async_trait]
pub trait LeadExtractor: Send + Sync {
    /// Name of this extractor for logging.
    fn name(&self) -> &str;

    /// Returns at most `request.limit` companies, none of them excluded.
    /// An empty list is a valid answer.
    async fn extract(&self, request: &ExtractionRequest)
        -> Result<Vec<ExtractedLead>, ProspectError>;
}

/// Researches one company and drafts outreach for it.
#[async_trait]
pub trait LeadEnricher: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the fields it could find; an empty patch is a valid answer.
    async fn enrich(&self, request: &EnrichmentRequest) -> Result<LeadPatch, ProspectError>;
}
