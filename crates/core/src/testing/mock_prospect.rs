//! Mock extraction and enrichment steps.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use crate::lead::LeadPatch;
use crate::llm::LlmError;
use crate::prospect::{
    EnrichmentRequest, ExtractedLead, ExtractionRequest, LeadEnricher, LeadExtractor,
    ProspectError,
};

use super::fixtures;

fn mock_failure(status: u16) -> ProspectError {
    ProspectError::Llm(LlmError::Api {
        status,
        message: "mock failure".to_string(),
    })
}

/// Extractor returning a fixed list, honoring limit and exclusions.
pub struct MockExtractor {
    results: Mutex<Vec<ExtractedLead>>,
    error_status: Mutex<Option<u16>>,
    requests: Mutex<Vec<ExtractionRequest>>,
}

impl MockExtractor {
    pub fn returning(results: Vec<ExtractedLead>) -> Self {
        Self {
            results: Mutex::new(results),
            error_status: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with a provider error carrying `status`.
    pub fn failing(status: u16) -> Self {
        let extractor = Self::returning(Vec::new());
        *extractor.error_status.lock().unwrap() = Some(status);
        extractor
    }

    pub fn set_results(&self, results: Vec<ExtractedLead>) {
        *self.results.lock().unwrap() = results;
    }

    pub fn requests(&self) -> Vec<ExtractionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LeadExtractor for MockExtractor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn extract(
        &self,
        request: &ExtractionRequest,
    ) -> Result<Vec<ExtractedLead>, ProspectError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(status) = *self.error_status.lock().unwrap() {
            return Err(mock_failure(status));
        }
        Ok(self
            .results
            .lock()
            .unwrap()
            .iter()
            .filter(|lead| !request.is_excluded(&lead.name))
            .take(request.limit)
            .cloned()
            .collect())
    }
}

/// Enricher producing [`fixtures::enrichment_patch`] unless told otherwise.
pub struct MockEnricher {
    failing: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
    patches: Mutex<HashMap<String, LeadPatch>>,
    delay: Option<Duration>,
    requests: Mutex<Vec<EnrichmentRequest>>,
}

impl Default for MockEnricher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEnricher {
    pub fn new() -> Self {
        Self {
            failing: Mutex::new(HashSet::new()),
            panicking: Mutex::new(HashSet::new()),
            patches: Mutex::new(HashMap::new()),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Simulate provider latency on every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Enriching `name` fails with a non-retryable provider error.
    pub fn fail_for(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    /// The next call for `name` panics. Later calls behave normally.
    pub fn panic_once_for(&self, name: &str) {
        self.panicking.lock().unwrap().insert(name.to_string());
    }

    pub fn set_patch(&self, name: &str, patch: LeadPatch) {
        self.patches.lock().unwrap().insert(name.to_string(), patch);
    }

    pub fn requests(&self) -> Vec<EnrichmentRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LeadEnricher for MockEnricher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn enrich(&self, request: &EnrichmentRequest) -> Result<LeadPatch, ProspectError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panicking.lock().unwrap().remove(&request.name) {
            panic!("mock enricher panicked on {}", request.name);
        }
        if self.failing.lock().unwrap().contains(&request.name) {
            return Err(mock_failure(400));
        }
        let patch = self.patches.lock().unwrap().get(&request.name).cloned();
        Ok(patch.unwrap_or_else(|| fixtures::enrichment_patch(&request.name)))
    }
}
