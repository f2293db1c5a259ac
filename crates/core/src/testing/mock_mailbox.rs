//! Mock mailbox for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::mailbox::{Mailbox, MailboxError, OutgoingEmail, SentMessage};
use crate::session::SenderCredential;

/// A send accepted by the mock.
#[derive(Debug, Clone)]
pub struct RecordedSend {
    pub sender: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Mailbox that records sends and fails on demand, by sender or recipient.
#[derive(Default)]
pub struct MockMailbox {
    sent: Mutex<Vec<RecordedSend>>,
    failing_senders: Mutex<HashMap<String, u16>>,
    failing_recipients: Mutex<HashMap<String, u16>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send takes `delay` before it is accepted or rejected.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sends from `email` fail with provider status `status`.
    pub fn fail_sender(&self, email: &str, status: u16) {
        self.failing_senders
            .lock()
            .unwrap()
            .insert(email.to_string(), status);
    }

    /// Sends to `email` fail with provider status `status`.
    pub fn fail_recipient(&self, email: &str, status: u16) {
        self.failing_recipients
            .lock()
            .unwrap()
            .insert(email.to_string(), status);
    }

    pub fn clear_failures(&self) {
        self.failing_senders.lock().unwrap().clear();
        self.failing_recipients.lock().unwrap().clear();
    }

    /// Successful sends, in order.
    pub fn sent(&self) -> Vec<RecordedSend> {
        self.sent.lock().unwrap().clone()
    }

    /// All attempts, failed ones included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most sends that were ever in progress at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Mailbox for MockMailbox {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(
        &self,
        sender: &SenderCredential,
        message: &OutgoingEmail,
    ) -> Result<SentMessage, MailboxError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            let active = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(active, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        } else {
            self.max_in_flight.fetch_max(1, Ordering::SeqCst);
        }

        let failure = self
            .failing_senders
            .lock()
            .unwrap()
            .get(&sender.email)
            .or(self.failing_recipients.lock().unwrap().get(&message.to))
            .copied();
        if let Some(status) = failure {
            return Err(MailboxError::Api {
                status,
                message: format!("mock rejection for {}", sender.email),
            });
        }

        self.sent.lock().unwrap().push(RecordedSend {
            sender: sender.email.clone(),
            to: message.to.clone(),
            subject: message.subject.clone(),
            body: message.body.clone(),
        });
        Ok(SentMessage {
            id: Some(format!("mock-{}", n)),
            thread_id: None,
        })
    }
}
