//! Dispatch loop implementation.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::lead::{AutomationStatus, FunnelStatus, LeadCollection, LeadPatch};
use crate::mailbox::{Mailbox, OutgoingEmail};
use crate::metrics::EMAILS_SENT;
use crate::retry::{with_retry, RetryPolicy};
use crate::session::SessionContext;

use super::config::DispatchConfig;
use super::types::{
    DispatchError, DispatchEvent, DispatchLogEntry, DispatchOutcome, DispatchStatus, LogLevel,
};

/// Which run owns the loop. A new generation starts on every `start`.
#[derive(Default)]
struct Control {
    generation: u64,
    shutdown: Option<broadcast::Sender<()>>,
    /// Task of the latest generation. It may outlive `stop` while a send
    /// finishes.
    task: Option<JoinHandle<()>>,
}

#[derive(Debug, Clone, Default)]
struct LoopState {
    next_run_at: Option<DateTime<Utc>>,
    sent_count: u64,
    failed_count: u64,
    message: Option<String>,
}

struct Shared {
    config: DispatchConfig,
    retry: RetryPolicy,
    leads: Arc<LeadCollection>,
    session: Arc<SessionContext>,
    mailbox: Arc<dyn Mailbox>,
    control: Mutex<Control>,
    /// Serializes `start` calls while one waits for the previous task.
    start_lock: tokio::sync::Mutex<()>,
    state: RwLock<LoopState>,
    logs: Mutex<VecDeque<DispatchLogEntry>>,
    events: broadcast::Sender<DispatchEvent>,
}

/// Sends queued leads in the background, one at a time.
pub struct DispatchLoop {
    shared: Arc<Shared>,
}

impl DispatchLoop {
    pub fn new(
        config: DispatchConfig,
        retry: RetryPolicy,
        leads: Arc<LeadCollection>,
        session: Arc<SessionContext>,
        mailbox: Arc<dyn Mailbox>,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        let capacity = config.log_capacity;
        Self {
            shared: Arc::new(Shared {
                config,
                retry,
                leads,
                session,
                mailbox,
                control: Mutex::new(Control::default()),
                start_lock: tokio::sync::Mutex::new(()),
                state: RwLock::new(LoopState::default()),
                logs: Mutex::new(VecDeque::with_capacity(capacity)),
                events,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.shared.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.shared.control().shutdown.is_some()
    }

    /// Start the loop. The first attempt happens immediately. Returns `false`
    /// when it was already running.
    ///
    /// A task left over from a previous run is awaited first, so a send that
    /// was in flight when the loop stopped completes before the next one.
    pub async fn start(&self) -> bool {
        let _starting = self.shared.start_lock.lock().await;

        let previous = {
            let mut control = self.shared.control();
            if control.shutdown.is_some() {
                debug!("Dispatch loop already running");
                return false;
            }
            control.task.take()
        };
        if let Some(task) = previous {
            if !task.is_finished() {
                info!("Waiting for the previous dispatch run to finish");
            }
            if let Err(e) = task.await {
                warn!("Previous dispatch run ended abnormally: {}", e);
            }
        }

        let (generation, shutdown_rx) = {
            let mut control = self.shared.control();
            control.generation += 1;
            let (tx, rx) = broadcast::channel(1);
            control.shutdown = Some(tx);
            (control.generation, rx)
        };

        info!(generation, "Starting dispatch loop");
        self.shared.state.write().await.message = Some("Running".to_string());
        self.shared
            .push_log(DispatchLogEntry::new(LogLevel::Info, "Automation started"));
        let _ = self.shared.events.send(DispatchEvent::Started);

        let shared = Arc::clone(&self.shared);
        let task = tokio::spawn(shared.run_loop(generation, shutdown_rx));
        self.shared.control().task = Some(task);
        true
    }

    /// Stop the loop. A send already in flight completes and is recorded;
    /// nothing further is scheduled. Returns `false` when it was not running.
    pub async fn stop(&self) -> bool {
        let Some(shutdown) = self.shared.control().shutdown.take() else {
            return false;
        };
        let _ = shutdown.send(());

        info!("Stopping dispatch loop");
        {
            let mut state = self.shared.state.write().await;
            state.next_run_at = None;
            state.message = Some("Stopped".to_string());
        }
        self.shared
            .push_log(DispatchLogEntry::new(LogLevel::Info, "Automation stopped"));
        let _ = self.shared.events.send(DispatchEvent::Stopped);
        true
    }

    pub async fn status(&self) -> DispatchStatus {
        let state = self.shared.state.read().await.clone();
        let running = self.is_running();
        let next_run_at = state.next_run_at.filter(|_| running);
        let countdown_secs =
            next_run_at.map(|at| (at - Utc::now()).num_seconds().max(0) as u64);

        DispatchStatus {
            running,
            next_run_at,
            countdown_secs,
            sent_count: state.sent_count,
            failed_count: state.failed_count,
            queued_count: self.shared.leads.queued_count().await,
            sender_count: self.shared.session.senders().await.len(),
            message: state.message,
        }
    }

    /// Log lines, oldest first.
    pub fn logs(&self) -> Vec<DispatchLogEntry> {
        self.shared.logs().iter().cloned().collect()
    }

    /// Attempt one send right now, outside the schedule.
    pub async fn dispatch_once(&self) -> Result<DispatchOutcome, DispatchError> {
        self.shared.dispatch_once().await
    }
}

impl Shared {
    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn logs(&self) -> MutexGuard<'_, VecDeque<DispatchLogEntry>> {
        self.logs.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn push_log(&self, entry: DispatchLogEntry) {
        {
            let mut logs = self.logs();
            while logs.len() >= self.config.log_capacity.max(1) {
                logs.pop_front();
            }
            logs.push_back(entry.clone());
        }
        let _ = self.events.send(DispatchEvent::Log { entry });
    }

    fn is_current(&self, generation: u64) -> bool {
        let control = self.control();
        control.generation == generation && control.shutdown.is_some()
    }

    /// Stop from inside the loop, unless a newer run has taken over.
    async fn halt(&self, generation: u64, level: LogLevel, message: &str) {
        {
            let mut control = self.control();
            if control.generation != generation || control.shutdown.is_none() {
                return;
            }
            control.shutdown = None;
        }
        info!("Dispatch loop stopped: {}", message);
        {
            let mut state = self.state.write().await;
            state.next_run_at = None;
            state.message = Some(message.to_string());
        }
        self.push_log(DispatchLogEntry::new(level, message));
        let _ = self.events.send(DispatchEvent::Stopped);
    }

    async fn run_loop(self: Arc<Self>, generation: u64, mut shutdown_rx: broadcast::Receiver<()>) {
        loop {
            if !self.is_current(generation) {
                break;
            }
            self.state.write().await.next_run_at = None;

            let delay = match self.dispatch_once().await {
                Ok(DispatchOutcome::Sent { .. }) => self.config.success_delay(),
                Ok(DispatchOutcome::Skipped) => continue,
                Ok(DispatchOutcome::QueueEmpty) => {
                    self.halt(generation, LogLevel::Info, "Queue empty, automation stopped")
                        .await;
                    break;
                }
                Err(DispatchError::NoSender(_)) => {
                    self.halt(
                        generation,
                        LogLevel::Warn,
                        "No sender available, automation stopped",
                    )
                    .await;
                    break;
                }
                Err(DispatchError::Send { .. }) => self.config.failure_delay(),
            };

            if !self.is_current(generation) {
                break;
            }
            self.schedule(delay).await;

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!(generation, "Dispatch loop received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
        debug!(generation, "Dispatch loop exited");
    }

    async fn schedule(&self, delay: Duration) {
        let next_run_at = Utc::now()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        {
            let mut state = self.state.write().await;
            state.next_run_at = Some(next_run_at);
            state.message = Some(format!("Next send in {}s", delay.as_secs()));
        }
        debug!(delay_secs = delay.as_secs(), "Next dispatch scheduled");
        let _ = self.events.send(DispatchEvent::Scheduled { next_run_at });
    }

    async fn dispatch_once(&self) -> Result<DispatchOutcome, DispatchError> {
        let Some(lead) = self.leads.first_dispatchable().await else {
            return Ok(DispatchOutcome::QueueEmpty);
        };
        let sender = self.session.current_sender().await?;

        if self
            .leads
            .merge(&lead.id, &LeadPatch::automation(AutomationStatus::Sending))
            .await
            .is_none()
        {
            return Ok(DispatchOutcome::Skipped);
        }
        debug!(lead = %lead.name, sender = %sender.email, "Sending outreach");

        let result = match OutgoingEmail::from_lead(&lead) {
            Ok(message) => {
                with_retry(
                    &self.retry,
                    || self.mailbox.send(&sender, &message),
                    |notice| {
                        self.push_log(
                            DispatchLogEntry::new(LogLevel::Warn, notice.message.clone())
                                .with_lead(lead.id.clone())
                                .with_sender(sender.email.clone()),
                        )
                    },
                )
                .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(receipt) => {
                let patch = LeadPatch {
                    automation: Some(AutomationStatus::Sent),
                    funnel: Some(FunnelStatus::Contacted),
                    sent_at: Some(Utc::now()),
                    ..Default::default()
                };
                self.leads.merge(&lead.id, &patch).await;

                // Only a successful send moves the rotation forward.
                if let Err(e) = self.session.complete_turn(&sender.id).await {
                    warn!("Could not advance rotation after send: {}", e);
                }
                self.state.write().await.sent_count += 1;
                EMAILS_SENT.with_label_values(&["sent"]).inc();

                info!(
                    lead = %lead.name,
                    to = %lead.email,
                    sender = %sender.email,
                    message_id = ?receipt.id,
                    "Outreach sent"
                );
                self.push_log(
                    DispatchLogEntry::new(
                        LogLevel::Success,
                        format!("Sent to {} ({}) via {}", lead.name, lead.email, sender.email),
                    )
                    .with_lead(lead.id.clone())
                    .with_sender(sender.email.clone()),
                );

                Ok(DispatchOutcome::Sent {
                    lead_id: lead.id,
                    sender: sender.email,
                })
            }
            Err(e) => {
                self.leads
                    .merge(&lead.id, &LeadPatch::automation(AutomationStatus::Failed))
                    .await;
                self.state.write().await.failed_count += 1;
                EMAILS_SENT.with_label_values(&["failed"]).inc();

                error!(lead = %lead.name, sender = %sender.email, "Outreach failed: {}", e);
                self.push_log(
                    DispatchLogEntry::new(
                        LogLevel::Error,
                        format!("Send to {} failed: {}", lead.name, e),
                    )
                    .with_lead(lead.id.clone())
                    .with_sender(sender.email.clone()),
                );

                Err(DispatchError::Send {
                    lead_id: lead.id,
                    source: e,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lead::Lead;
    use crate::session::{SenderCredential, SenderProfile, Session};
    use crate::testing::{fixtures, MockMailbox};

    struct Harness {
        dispatch: DispatchLoop,
        leads: Arc<LeadCollection>,
        session: Arc<SessionContext>,
        mailbox: Arc<MockMailbox>,
    }

    fn harness(senders: &[&str], leads: Vec<Lead>) -> Harness {
        let mut session = Session::new("demo", SenderProfile::default(), 0);
        session.senders = senders
            .iter()
            .map(|email| SenderCredential::new(*email, format!("token-{}", email)))
            .collect();
        let session = Arc::new(SessionContext::new(session));
        let leads = Arc::new(LeadCollection::with_leads(leads));
        let mailbox = Arc::new(MockMailbox::new());
        let dispatch = DispatchLoop::new(
            DispatchConfig::default(),
            RetryPolicy::new(1, Duration::from_millis(10)),
            leads.clone(),
            session.clone(),
            mailbox.clone(),
        );
        Harness {
            dispatch,
            leads,
            session,
            mailbox,
        }
    }

    async fn wait_for_stop(rx: &mut broadcast::Receiver<DispatchEvent>) {
        loop {
            if let DispatchEvent::Stopped = rx.recv().await.unwrap() {
                return;
            }
        }
    }

    #[tokio::test]
    async fn test_success_advances_cursor_and_marks_lead() {
        let lead = fixtures::queued_lead("Acme", "info@acme.com");
        let h = harness(&["a@x.com", "b@x.com"], vec![lead.clone()]);

        let outcome = h.dispatch.dispatch_once().await.unwrap();

        assert_eq!(
            outcome,
            DispatchOutcome::Sent {
                lead_id: lead.id.clone(),
                sender: "a@x.com".to_string()
            }
        );
        let sent = h.leads.get(&lead.id).await.unwrap();
        assert_eq!(sent.automation, AutomationStatus::Sent);
        assert_eq!(sent.funnel, Some(FunnelStatus::Contacted));
        assert!(sent.sent_at.is_some());
        assert_eq!(h.session.cursor().await, 1);
        assert_eq!(h.session.senders().await[0].usage_count, 1);
    }

    #[tokio::test]
    async fn test_failure_keeps_cursor() {
        let lead = fixtures::queued_lead("Acme", "info@acme.com");
        let h = harness(&["a@x.com"], vec![lead.clone()]);
        h.mailbox.fail_sender("a@x.com", 401);

        let err = h.dispatch.dispatch_once().await.unwrap_err();

        assert!(matches!(err, DispatchError::Send { .. }));
        assert_eq!(
            h.leads.get(&lead.id).await.unwrap().automation,
            AutomationStatus::Failed
        );
        assert_eq!(h.session.cursor().await, 0);
        assert_eq!(h.dispatch.status().await.failed_count, 1);
        assert_eq!(h.dispatch.logs().last().unwrap().level, LogLevel::Error);
    }

    #[tokio::test]
    async fn test_empty_pool_leaves_lead_queued() {
        let lead = fixtures::queued_lead("Acme", "info@acme.com");
        let h = harness(&[], vec![lead.clone()]);

        let err = h.dispatch.dispatch_once().await.unwrap_err();

        assert!(matches!(err, DispatchError::NoSender(_)));
        assert_eq!(
            h.leads.get(&lead.id).await.unwrap().automation,
            AutomationStatus::Queued
        );
        assert_eq!(h.mailbox.call_count(), 0);
    }

    #[tokio::test]
    async fn test_lead_without_draft_fails_without_calling_provider() {
        let mut lead = fixtures::queued_lead("Acme", "info@acme.com");
        lead.email_draft = None;
        let h = harness(&["a@x.com"], vec![lead.clone()]);

        assert!(h.dispatch.dispatch_once().await.is_err());
        assert_eq!(h.mailbox.call_count(), 0);
        assert_eq!(h.session.cursor().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_stops_itself_on_empty_queue() {
        let h = harness(&["a@x.com"], Vec::new());
        let mut events = h.dispatch.subscribe();

        assert!(h.dispatch.start().await);
        wait_for_stop(&mut events).await;

        assert!(!h.dispatch.is_running());
        let logs = h.dispatch.logs();
        assert!(logs.last().unwrap().message.contains("Queue empty"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_stops_itself_without_senders() {
        let h = harness(&[], vec![fixtures::queued_lead("Acme", "info@acme.com")]);
        let mut events = h.dispatch.subscribe();

        h.dispatch.start().await;
        wait_for_stop(&mut events).await;

        assert!(!h.dispatch.is_running());
        assert!(h.dispatch.logs().last().unwrap().message.contains("No sender"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_is_a_noop() {
        let h = harness(
            &["a@x.com"],
            vec![
                fixtures::queued_lead("A", "a@a.com"),
                fixtures::queued_lead("B", "b@b.com"),
            ],
        );

        assert!(h.dispatch.start().await);
        assert!(!h.dispatch.start().await);
        tokio::time::sleep(Duration::from_secs(1)).await;

        // One loop: one send, then waiting out the success delay.
        assert_eq!(h.mailbox.call_count(), 1);
        assert!(h.dispatch.stop().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_delay_is_within_window() {
        let h = harness(
            &["a@x.com"],
            vec![
                fixtures::queued_lead("A", "a@a.com"),
                fixtures::queued_lead("B", "b@b.com"),
            ],
        );

        h.dispatch.start().await;
        tokio::time::sleep(Duration::from_secs(419)).await;
        assert_eq!(h.mailbox.call_count(), 1);

        tokio::time::sleep(Duration::from_secs(122)).await;
        assert_eq!(h.mailbox.call_count(), 2);
        h.dispatch.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_reschedules_after_fixed_delay() {
        let h = harness(
            &["a@x.com"],
            vec![
                fixtures::queued_lead("A", "a@a.com"),
                fixtures::queued_lead("B", "b@b.com"),
            ],
        );
        h.mailbox.fail_recipient("a@a.com", 400);

        h.dispatch.start().await;
        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(h.mailbox.call_count(), 1);
        let status = h.dispatch.status().await;
        assert!(status.running);
        assert!(status.countdown_secs.is_some());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(h.mailbox.call_count(), 2);
        h.dispatch.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_run_and_zeroes_countdown() {
        let h = harness(
            &["a@x.com"],
            vec![
                fixtures::queued_lead("A", "a@a.com"),
                fixtures::queued_lead("B", "b@b.com"),
            ],
        );

        h.dispatch.start().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(h.dispatch.stop().await);
        assert!(!h.dispatch.stop().await);

        let status = h.dispatch.status().await;
        assert!(!status.running);
        assert!(status.countdown_secs.is_none());
        assert!(status.next_run_at.is_none());

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(h.mailbox.call_count(), 1);
    }

    #[tokio::test]
    async fn test_log_is_bounded() {
        let h = harness(&["a@x.com"], Vec::new());
        for i in 0..250 {
            h.dispatch
                .shared
                .push_log(DispatchLogEntry::new(LogLevel::Info, format!("line {}", i)));
        }
        let logs = h.dispatch.logs();
        assert_eq!(logs.len(), 200);
        assert_eq!(logs[0].message, "line 50");
        assert_eq!(logs[199].message, "line 249");
    }
}
