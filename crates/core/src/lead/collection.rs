//! Shared, newest-first lead collection.
//!
//! The enrichment pipeline and the dispatch loop both write to this collection
//! concurrently. Every write is a merge-by-id under a single write lock, so
//! updates to different leads never clobber each other. Each mutation is
//! published as a [`LeadEvent`] for incremental consumers (websocket, persistence).

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

use super::types::{AutomationStatus, Lead, LeadPatch};

/// Incremental change to the collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LeadEvent {
    /// New leads were prepended (in display order).
    Added { leads: Vec<Lead> },
    /// A lead was merged with a patch; carries the resulting record.
    Updated { lead: Lead },
    /// A lead was removed.
    Removed { id: String },
    /// The collection was replaced or cleared.
    Reset { count: usize },
}

/// The lead collection.
pub struct LeadCollection {
    leads: RwLock<Vec<Lead>>,
    events: broadcast::Sender<LeadEvent>,
}

impl Default for LeadCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl LeadCollection {
    pub fn new() -> Self {
        Self::with_leads(Vec::new())
    }

    /// Create a collection preloaded with persisted leads (newest first).
    pub fn with_leads(leads: Vec<Lead>) -> Self {
        let (events, _) = broadcast::channel(512);
        Self {
            leads: RwLock::new(leads),
            events,
        }
    }

    /// Subscribe to incremental updates.
    pub fn subscribe(&self) -> broadcast::Receiver<LeadEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: LeadEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    /// Prepend a batch, keeping the batch's own order at the top.
    pub async fn prepend_all(&self, batch: Vec<Lead>) {
        if batch.is_empty() {
            return;
        }
        {
            let mut leads = self.leads.write().await;
            leads.splice(0..0, batch.iter().cloned());
        }
        self.publish(LeadEvent::Added { leads: batch });
    }

    /// Merge a patch into the lead with `id`. Returns the updated lead.
    pub async fn merge(&self, id: &str, patch: &LeadPatch) -> Option<Lead> {
        let updated = {
            let mut leads = self.leads.write().await;
            let lead = leads.iter_mut().find(|l| l.id == id)?;
            patch.apply_to(lead);
            lead.clone()
        };
        self.publish(LeadEvent::Updated {
            lead: updated.clone(),
        });
        Some(updated)
    }

    pub async fn get(&self, id: &str) -> Option<Lead> {
        self.leads.read().await.iter().find(|l| l.id == id).cloned()
    }

    pub async fn list(&self) -> Vec<Lead> {
        self.leads.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.leads.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.leads.read().await.is_empty()
    }

    /// Names of the most recent `limit` leads.
    pub async fn recent_names(&self, limit: usize) -> Vec<String> {
        self.leads
            .read()
            .await
            .iter()
            .take(limit)
            .map(|l| l.name.clone())
            .collect()
    }

    /// First queued lead with a plausible email, in collection order.
    pub async fn first_dispatchable(&self) -> Option<Lead> {
        self.leads
            .read()
            .await
            .iter()
            .find(|l| l.is_dispatchable())
            .cloned()
    }

    /// Number of leads currently queued for dispatch.
    pub async fn queued_count(&self) -> usize {
        self.leads
            .read()
            .await
            .iter()
            .filter(|l| l.automation == AutomationStatus::Queued)
            .count()
    }

    /// Queue the given leads for dispatch. Leads already sent or sending are
    /// left alone. Returns the ids that were queued.
    pub async fn queue(&self, ids: &[String]) -> Vec<String> {
        let mut queued = Vec::new();
        for id in ids {
            let Some(lead) = self.get(id).await else {
                continue;
            };
            if matches!(
                lead.automation,
                AutomationStatus::Sent | AutomationStatus::Sending
            ) {
                continue;
            }
            if self
                .merge(id, &LeadPatch::automation(AutomationStatus::Queued))
                .await
                .is_some()
            {
                queued.push(id.clone());
            }
        }
        queued
    }

    pub async fn remove(&self, id: &str) -> Option<Lead> {
        let removed = {
            let mut leads = self.leads.write().await;
            let idx = leads.iter().position(|l| l.id == id)?;
            leads.remove(idx)
        };
        self.publish(LeadEvent::Removed { id: id.to_string() });
        Some(removed)
    }

    pub async fn replace_all(&self, new_leads: Vec<Lead>) {
        let count = new_leads.len();
        *self.leads.write().await = new_leads;
        self.publish(LeadEvent::Reset { count });
    }

    pub async fn clear(&self) {
        self.replace_all(Vec::new()).await;
    }
}
