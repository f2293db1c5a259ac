//! Loading and saving the local state (session and leads).
//!
//! State is written as whole snapshots after changes, batched so a burst of
//! lead updates during a pipeline run costs one write.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use prospector_core::{
    AutomationStatus, Lead, LeadCollection, ProcessingStatus, SenderProfile, Session,
    SessionConfig, SessionContext, StateStore, StateStoreExt, StoreError, LEADS_KEY, SESSION_KEY,
};

/// Longest a change waits before it is written.
pub const FLUSH_DELAY: Duration = Duration::from_millis(500);

/// Load the saved session, or seed a fresh one from config.
pub fn load_session(store: &dyn StateStore, seed: &SessionConfig) -> Result<Session, StoreError> {
    match store.load::<Session>(SESSION_KEY)? {
        Some(session) => {
            info!(
                user_id = %session.user_id,
                quota = session.quota,
                senders = session.senders.len(),
                "Restored session"
            );
            Ok(session)
        }
        None => {
            info!(user_id = %seed.user_id, quota = seed.initial_quota, "Starting new session");
            let profile: SenderProfile = seed.profile.clone();
            Ok(Session::new(seed.user_id.clone(), profile, seed.initial_quota))
        }
    }
}

/// Load saved leads. Work that was in flight when the process stopped is
/// never resumed: those leads come back as failed.
pub fn load_leads(store: &dyn StateStore) -> Result<Vec<Lead>, StoreError> {
    let mut leads: Vec<Lead> = store.load(LEADS_KEY)?.unwrap_or_default();
    let interrupted = leads
        .iter_mut()
        .map(recover_interrupted)
        .filter(|changed| *changed)
        .count();
    if interrupted > 0 {
        warn!(count = interrupted, "Marked interrupted leads as failed");
    }
    info!(count = leads.len(), "Restored leads");
    Ok(leads)
}

fn recover_interrupted(lead: &mut Lead) -> bool {
    let mut changed = false;
    if matches!(
        lead.status,
        ProcessingStatus::Pending | ProcessingStatus::Processing
    ) {
        lead.status = ProcessingStatus::Failed;
        changed = true;
    }
    if lead.automation == AutomationStatus::Sending {
        lead.automation = AutomationStatus::Failed;
        changed = true;
    }
    changed
}

/// Write both snapshots now.
pub async fn save_all(
    store: &dyn StateStore,
    session: &SessionContext,
    leads: &LeadCollection,
) -> Result<(), StoreError> {
    store.save(SESSION_KEY, &session.snapshot().await)?;
    store.save(LEADS_KEY, &leads.list().await)?;
    Ok(())
}

/// Save after every change until `shutdown` fires, then flush once more.
pub fn spawn_persistence(
    store: Arc<dyn StateStore>,
    session: Arc<SessionContext>,
    leads: Arc<LeadCollection>,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    let mut lead_events = leads.subscribe();
    let mut session_events = session.subscribe();

    tokio::spawn(async move {
        let mut deadline: Option<Instant> = None;

        loop {
            let flush_at = deadline;
            let flush = async move {
                match flush_at {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            let changed = tokio::select! {
                _ = shutdown.recv() => break,
                _ = flush => {
                    deadline = None;
                    if let Err(e) = save_all(store.as_ref(), &session, &leads).await {
                        error!("Failed to save state: {}", e);
                    } else {
                        debug!("State saved");
                    }
                    false
                }
                result = lead_events.recv() => match result {
                    Ok(_) | Err(RecvError::Lagged(_)) => true,
                    Err(RecvError::Closed) => break,
                },
                result = session_events.recv() => match result {
                    Ok(_) | Err(RecvError::Lagged(_)) => true,
                    Err(RecvError::Closed) => break,
                },
            };

            if changed && deadline.is_none() {
                deadline = Some(Instant::now() + FLUSH_DELAY);
            }
        }

        if let Err(e) = save_all(store.as_ref(), &session, &leads).await {
            error!("Failed to save state on shutdown: {}", e);
        } else {
            info!("State saved on shutdown");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use prospector_core::testing::fixtures;
    use prospector_core::{LeadPatch, MemoryStateStore};

    #[test]
    fn test_load_session_seeds_from_config() {
        let store = MemoryStateStore::new();
        let seed = SessionConfig {
            user_id: "ayse".to_string(),
            initial_quota: 12,
            profile: SenderProfile::default(),
        };

        let session = load_session(&store, &seed).unwrap();
        assert_eq!(session.user_id, "ayse");
        assert_eq!(session.quota, 12);
        assert!(session.senders.is_empty());
    }

    #[test]
    fn test_load_session_prefers_saved() {
        let store = MemoryStateStore::new();
        store
            .save(SESSION_KEY, &fixtures::session(3, &["a@x.com"]))
            .unwrap();

        let session = load_session(&store, &SessionConfig::default()).unwrap();
        assert_eq!(session.quota, 3);
        assert_eq!(session.senders.len(), 1);
    }

    #[test]
    fn test_load_leads_fails_interrupted_work() {
        let store = MemoryStateStore::new();
        let mut sending = fixtures::queued_lead("Sending Co", "a@sending.com");
        sending.automation = AutomationStatus::Sending;
        let pending = Lead::provisional("Pending Co", None, "İzmir", "Yazılım");
        let queued = fixtures::queued_lead("Queued Co", "b@queued.com");
        store
            .save(LEADS_KEY, &vec![sending, pending, queued.clone()])
            .unwrap();

        let leads = load_leads(&store).unwrap();
        assert_eq!(leads[0].automation, AutomationStatus::Failed);
        assert_eq!(leads[1].status, ProcessingStatus::Failed);
        assert_eq!(leads[2], queued);
    }

    #[test]
    fn test_load_leads_empty_store() {
        let store = MemoryStateStore::new();
        assert!(load_leads(&store).unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistence_batches_and_flushes_on_shutdown() {
        let store = Arc::new(MemoryStateStore::new());
        let session = Arc::new(SessionContext::new(fixtures::session(5, &[])));
        let leads = Arc::new(LeadCollection::new());
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = spawn_persistence(
            store.clone(),
            Arc::clone(&session),
            Arc::clone(&leads),
            shutdown_rx,
        );

        let lead = fixtures::queued_lead("Acme", "info@acme.com");
        leads.prepend_all(vec![lead.clone()]).await;
        session.consume_credit().await;

        tokio::time::sleep(FLUSH_DELAY * 2).await;
        let saved: Vec<Lead> = store.load(LEADS_KEY).unwrap().unwrap();
        assert_eq!(saved.len(), 1);
        let saved_session: Session = store.load(SESSION_KEY).unwrap().unwrap();
        assert_eq!(saved_session.quota, 4);

        leads
            .merge(&lead.id, &LeadPatch::automation(AutomationStatus::Sent))
            .await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        let saved: Vec<Lead> = store.load(LEADS_KEY).unwrap().unwrap();
        assert_eq!(saved[0].automation, AutomationStatus::Sent);
    }
}
