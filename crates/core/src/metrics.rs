//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Enrichment pipeline (runs, extracted leads, per-lead enrichment)
//! - Dispatch loop (sends by result)
//! - External providers (retries, LLM tokens)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Pipeline Metrics
// =============================================================================

/// Pipeline runs by outcome.
pub static PIPELINE_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("prospector_pipeline_runs_total", "Total enrichment pipeline runs"),
        &["result"], // "completed", "cancelled", "empty", "insufficient_balance", "failed"
    )
    .unwrap()
});

/// Leads created by extraction.
pub static LEADS_EXTRACTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "prospector_leads_extracted_total",
        "Total leads created by extraction",
    )
    .unwrap()
});

/// Per-lead enrichment outcomes.
pub static ENRICHMENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("prospector_enrichments_total", "Total lead enrichments"),
        &["result"], // "completed", "failed"
    )
    .unwrap()
});

/// Enrichment call duration in seconds.
pub static ENRICHMENT_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "prospector_enrichment_duration_seconds",
            "Duration of a single lead enrichment",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        &["result"],
    )
    .unwrap()
});

// =============================================================================
// Dispatch Metrics
// =============================================================================

/// Outreach emails by result.
pub static EMAILS_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("prospector_emails_total", "Total outreach send attempts"),
        &["result"], // "sent", "failed"
    )
    .unwrap()
});

// =============================================================================
// Provider Metrics
// =============================================================================

/// Retries issued by the backoff wrapper.
pub static PROVIDER_RETRIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "prospector_provider_retries_total",
        "Total provider calls retried after a transient failure",
    )
    .unwrap()
});

/// LLM tokens used.
pub static LLM_TOKENS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("prospector_llm_tokens_total", "Total LLM tokens used"),
        &["provider", "direction"], // direction: "input", "output"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(PIPELINE_RUNS.clone()),
        Box::new(LEADS_EXTRACTED.clone()),
        Box::new(ENRICHMENTS.clone()),
        Box::new(ENRICHMENT_DURATION.clone()),
        Box::new(EMAILS_SENT.clone()),
        Box::new(PROVIDER_RETRIES.clone()),
        Box::new(LLM_TOKENS.clone()),
    ]
}

/// Record token usage for a provider.
pub fn record_llm_usage(provider: &str, usage: &crate::llm::LlmUsage) {
    LLM_TOKENS
        .with_label_values(&[provider, "input"])
        .inc_by(usage.input_tokens as u64);
    LLM_TOKENS
        .with_label_values(&[provider, "output"])
        .inc_by(usage.output_tokens as u64);
}
