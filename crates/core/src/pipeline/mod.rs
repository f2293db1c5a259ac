//! Sequential enrichment pipeline.
//!
//! One run at a time: extract a batch of companies, add them to the shared
//! lead collection, then enrich each one in extraction order. A failing lead
//! is marked failed and the run moves on; cancellation is checked between
//! leads.

mod config;
mod runner;
mod types;

pub use config::PipelineConfig;
pub use runner::EnrichmentPipeline;
pub use types::{
    PipelineError, PipelineEvent, PipelinePhase, PipelineRequest, PipelineStatus,
    PipelineSummary,
};
