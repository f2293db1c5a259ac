//! Types for the enrichment pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::prospect::ProspectError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("a pipeline run is already in progress")]
    AlreadyRunning,

    #[error("insufficient balance: no enrichment credits left")]
    InsufficientBalance,

    #[error("extraction failed: {0}")]
    Extraction(#[source] ProspectError),
}

/// What the pipeline is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    #[default]
    Idle,
    Extracting,
    Enriching,
}

impl PipelinePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelinePhase::Idle => "idle",
            PipelinePhase::Extracting => "extracting",
            PipelinePhase::Enriching => "enriching",
        }
    }
}

/// A request to discover and enrich leads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRequest {
    /// Market description or URL.
    pub query: String,
    #[serde(default)]
    pub sector: String,
    #[serde(default)]
    pub location: String,
    /// Requested number of leads, capped by configuration.
    pub limit: usize,
}

impl PipelineRequest {
    pub fn new(query: impl Into<String>, limit: usize) -> Self {
        Self {
            query: query.into(),
            sector: String::new(),
            location: String::new(),
            limit,
        }
    }

    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = sector.into();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }
}

/// Outcome of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub query: String,
    pub extracted: usize,
    pub enriched: usize,
    pub failed: usize,
    pub cancelled: bool,
    /// Ids of the leads created by this run, in extraction order.
    pub lead_ids: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Snapshot returned by `EnrichmentPipeline::status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineStatus {
    pub running: bool,
    pub phase: PipelinePhase,
    /// Progress counter; reset at the start of each run.
    pub step: u64,
    /// Leads in the current run.
    pub total: usize,
    pub enriched: usize,
    pub failed: usize,
    pub cancel_requested: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<PipelineSummary>,
}

/// Progress notification for live views.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    PhaseChanged {
        phase: PipelinePhase,
    },
    LeadProcessed {
        step: u64,
        lead_id: String,
        success: bool,
    },
    Finished {
        summary: PipelineSummary,
    },
    Failed {
        error: String,
    },
}
