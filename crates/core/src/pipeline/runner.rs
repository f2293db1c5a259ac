//! Enrichment pipeline implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};

use crate::lead::{Lead, LeadCollection, LeadPatch, ProcessingStatus};
use crate::metrics::{ENRICHMENTS, ENRICHMENT_DURATION, LEADS_EXTRACTED, PIPELINE_RUNS};
use crate::prospect::{EnrichmentRequest, ExtractionRequest, LeadEnricher, LeadExtractor};
use crate::session::SessionContext;

use super::config::PipelineConfig;
use super::types::{
    PipelineError, PipelineEvent, PipelinePhase, PipelineRequest, PipelineStatus,
    PipelineSummary,
};

/// Releases the run slot when a run ends, including by panic.
struct RunSlot<'a> {
    pipeline: &'a EnrichmentPipeline,
}

impl Drop for RunSlot<'_> {
    fn drop(&mut self) {
        if let Ok(mut status) = self.pipeline.status.try_write() {
            status.phase = PipelinePhase::Idle;
        }
        self.pipeline.cancel_requested.store(false, Ordering::SeqCst);
        self.pipeline.running.store(false, Ordering::SeqCst);
    }
}

/// Discovers leads for a market and enriches them one by one.
pub struct EnrichmentPipeline {
    config: PipelineConfig,
    extractor: Arc<dyn LeadExtractor>,
    enricher: Arc<dyn LeadEnricher>,
    leads: Arc<LeadCollection>,

    // Runtime state
    running: AtomicBool,
    cancel_requested: AtomicBool,
    status: RwLock<PipelineStatus>,
    events: broadcast::Sender<PipelineEvent>,
}

impl EnrichmentPipeline {
    pub fn new(
        config: PipelineConfig,
        extractor: Arc<dyn LeadExtractor>,
        enricher: Arc<dyn LeadEnricher>,
        leads: Arc<LeadCollection>,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            config,
            extractor,
            enricher,
            leads,
            running: AtomicBool::new(false),
            cancel_requested: AtomicBool::new(false),
            status: RwLock::new(PipelineStatus::default()),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn status(&self) -> PipelineStatus {
        let mut status = self.status.read().await.clone();
        status.running = self.is_running();
        status.cancel_requested = self.cancel_requested.load(Ordering::SeqCst);
        status
    }

    /// Ask the current run to stop before its next lead. Returns whether a
    /// run was in progress.
    pub fn cancel(&self) -> bool {
        if !self.is_running() {
            return false;
        }
        info!("Pipeline cancellation requested");
        self.cancel_requested.store(true, Ordering::SeqCst);
        true
    }

    /// Run to completion on the current task.
    pub async fn run(
        &self,
        request: PipelineRequest,
        session: &SessionContext,
    ) -> Result<PipelineSummary, PipelineError> {
        self.begin(session).await?;
        self.execute(request, session).await
    }

    /// Check preconditions, then run on a background task. Errors are
    /// returned before anything is spawned.
    pub async fn spawn(
        self: &Arc<Self>,
        request: PipelineRequest,
        session: Arc<SessionContext>,
    ) -> Result<(), PipelineError> {
        self.begin(&session).await?;
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = pipeline.execute(request, &session).await {
                warn!("Background pipeline run failed: {}", e);
            }
        });
        Ok(())
    }

    /// Claim the single run slot and check the balance.
    async fn begin(&self, session: &SessionContext) -> Result<(), PipelineError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(PipelineError::AlreadyRunning);
        }

        if !session.has_quota().await {
            self.running.store(false, Ordering::SeqCst);
            PIPELINE_RUNS
                .with_label_values(&["insufficient_balance"])
                .inc();
            warn!("Pipeline run rejected: no credits left");
            return Err(PipelineError::InsufficientBalance);
        }

        self.cancel_requested.store(false, Ordering::SeqCst);
        {
            let mut status = self.status.write().await;
            status.step = 0;
            status.total = 0;
            status.enriched = 0;
            status.failed = 0;
        }
        Ok(())
    }

    async fn set_phase(&self, phase: PipelinePhase) {
        self.status.write().await.phase = phase;
        let _ = self.events.send(PipelineEvent::PhaseChanged { phase });
    }

    /// Release the run slot and publish the outcome.
    async fn finish(&self, slot: RunSlot<'_>, result: &Result<PipelineSummary, PipelineError>) {
        {
            let mut status = self.status.write().await;
            status.phase = PipelinePhase::Idle;
            if let Ok(summary) = result {
                status.last_run = Some(summary.clone());
            }
        }
        drop(slot);

        let event = match result {
            Ok(summary) => PipelineEvent::Finished {
                summary: summary.clone(),
            },
            Err(e) => PipelineEvent::Failed {
                error: e.to_string(),
            },
        };
        let _ = self.events.send(PipelineEvent::PhaseChanged {
            phase: PipelinePhase::Idle,
        });
        let _ = self.events.send(event);
    }

    async fn execute(
        &self,
        request: PipelineRequest,
        session: &SessionContext,
    ) -> Result<PipelineSummary, PipelineError> {
        let slot = RunSlot { pipeline: self };
        let result = self.execute_inner(request, session).await;
        let label = match &result {
            Ok(s) if s.cancelled => "cancelled",
            Ok(s) if s.extracted == 0 => "empty",
            Ok(_) => "completed",
            Err(_) => "failed",
        };
        PIPELINE_RUNS.with_label_values(&[label]).inc();
        self.finish(slot, &result).await;
        result
    }

    async fn execute_inner(
        &self,
        request: PipelineRequest,
        session: &SessionContext,
    ) -> Result<PipelineSummary, PipelineError> {
        let started_at = Utc::now();
        let limit = request.limit.min(self.config.max_leads);
        info!(query = %request.query, limit, "Pipeline run started");

        // Extraction
        self.set_phase(PipelinePhase::Extracting).await;
        let extraction = ExtractionRequest::new(request.query.clone(), limit)
            .with_sector(request.sector.clone())
            .with_location(request.location.clone())
            .with_exclude_names(self.leads.recent_names(self.config.exclude_history).await);

        let extracted = match self.extractor.extract(&extraction).await {
            Ok(extracted) => extracted,
            Err(e) => {
                error!(extractor = self.extractor.name(), "Extraction failed: {}", e);
                return Err(PipelineError::Extraction(e));
            }
        };

        let batch: Vec<Lead> = extracted
            .into_iter()
            .take(limit)
            .map(|found| {
                let location = found
                    .location
                    .unwrap_or_else(|| request.location.clone());
                Lead::provisional(found.name, found.website, location, request.sector.clone())
            })
            .collect();

        let mut summary = PipelineSummary {
            query: request.query.clone(),
            extracted: batch.len(),
            enriched: 0,
            failed: 0,
            cancelled: false,
            lead_ids: batch.iter().map(|l| l.id.clone()).collect(),
            started_at,
            finished_at: started_at,
        };

        if batch.is_empty() {
            info!(query = %request.query, "Extraction returned no leads");
            summary.finished_at = Utc::now();
            return Ok(summary);
        }

        LEADS_EXTRACTED.inc_by(batch.len() as u64);
        self.status.write().await.total = batch.len();
        self.leads.prepend_all(batch.clone()).await;

        // Enrichment
        self.set_phase(PipelinePhase::Enriching).await;
        let profile = session.profile().await;

        for lead in &batch {
            if self.cancel_requested.load(Ordering::SeqCst) {
                info!(
                    enriched = summary.enriched,
                    remaining = summary.extracted - summary.enriched - summary.failed,
                    "Pipeline run cancelled"
                );
                summary.cancelled = true;
                break;
            }

            tokio::time::sleep(self.config.pacing_delay()).await;

            let enrichment = EnrichmentRequest {
                name: lead.name.clone(),
                website: lead.known_website().map(str::to_string),
                sector: request.sector.clone(),
                location: lead.location.clone(),
                profile: profile.clone(),
            };

            let started = Instant::now();
            let success = match self.enricher.enrich(&enrichment).await {
                Ok(patch) => {
                    ENRICHMENT_DURATION
                        .with_label_values(&["completed"])
                        .observe(started.elapsed().as_secs_f64());
                    ENRICHMENTS.with_label_values(&["completed"]).inc();
                    if patch.is_empty() {
                        debug!(lead = %lead.name, "Enrichment found nothing, completing as is");
                    }
                    self.leads
                        .merge(&lead.id, &patch.with_status(ProcessingStatus::Completed))
                        .await;
                    let remaining = session.consume_credit().await;
                    debug!(lead = %lead.name, credits = remaining, "Lead enriched");
                    summary.enriched += 1;
                    true
                }
                Err(e) => {
                    ENRICHMENT_DURATION
                        .with_label_values(&["failed"])
                        .observe(started.elapsed().as_secs_f64());
                    ENRICHMENTS.with_label_values(&["failed"]).inc();
                    warn!(lead = %lead.name, "Enrichment failed: {}", e);
                    self.leads
                        .merge(&lead.id, &LeadPatch::status(ProcessingStatus::Failed))
                        .await;
                    summary.failed += 1;
                    false
                }
            };

            let step = {
                let mut status = self.status.write().await;
                status.step += 1;
                if success {
                    status.enriched += 1;
                } else {
                    status.failed += 1;
                }
                status.step
            };
            let _ = self.events.send(PipelineEvent::LeadProcessed {
                step,
                lead_id: lead.id.clone(),
                success,
            });
        }

        summary.finished_at = Utc::now();
        info!(
            query = %summary.query,
            extracted = summary.extracted,
            enriched = summary.enriched,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "Pipeline run finished"
        );
        Ok(summary)
    }
}
