//! Shared session context.
//!
//! Replaces ambient global state: the pipeline and the dispatch loop receive an
//! `Arc<SessionContext>` explicitly. Loading at start and saving after changes
//! is the application's job; it listens on [`SessionContext::subscribe`].

use chrono::Utc;
use tokio::sync::{broadcast, RwLock};

use crate::dispatch::rotation::{self, RotationError};

use super::types::{SenderCredential, SenderProfile, Session, SessionEvent};

pub struct SessionContext {
    inner: RwLock<Session>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionContext {
    pub fn new(session: Session) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: RwLock::new(session),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    pub async fn snapshot(&self) -> Session {
        self.inner.read().await.clone()
    }

    pub async fn user_id(&self) -> String {
        self.inner.read().await.user_id.clone()
    }

    pub async fn profile(&self) -> SenderProfile {
        self.inner.read().await.profile.clone()
    }

    pub async fn set_profile(&self, profile: SenderProfile) {
        self.inner.write().await.profile = profile;
        self.publish(SessionEvent::ProfileChanged);
    }

    // -------------------------------------------------------------------------
    // Quota
    // -------------------------------------------------------------------------

    pub async fn quota(&self) -> u32 {
        self.inner.read().await.quota
    }

    pub async fn has_quota(&self) -> bool {
        self.quota().await > 0
    }

    /// Spend one credit, never going below zero. Returns the new balance.
    pub async fn consume_credit(&self) -> u32 {
        let quota = {
            let mut session = self.inner.write().await;
            session.quota = session.quota.saturating_sub(1);
            session.quota
        };
        self.publish(SessionEvent::QuotaChanged { quota });
        quota
    }

    pub async fn add_credits(&self, credits: u32) -> u32 {
        let quota = {
            let mut session = self.inner.write().await;
            session.quota = session.quota.saturating_add(credits);
            session.quota
        };
        self.publish(SessionEvent::QuotaChanged { quota });
        quota
    }

    // -------------------------------------------------------------------------
    // Sender pool and rotation
    // -------------------------------------------------------------------------

    pub async fn cursor(&self) -> usize {
        self.inner.read().await.rotation_cursor
    }

    pub async fn senders(&self) -> Vec<SenderCredential> {
        self.inner.read().await.senders.clone()
    }

    /// The sender whose turn it is, without advancing the cursor.
    pub async fn current_sender(&self) -> Result<SenderCredential, RotationError> {
        let session = self.inner.read().await;
        let idx = rotation::active_index(session.senders.len(), session.rotation_cursor)?;
        Ok(session.senders[idx].clone())
    }

    /// Record a successful send by `sender_id` and advance the cursor.
    /// Returns the new cursor.
    pub async fn complete_turn(&self, sender_id: &str) -> Result<usize, RotationError> {
        let cursor = {
            let mut session = self.inner.write().await;
            let next = rotation::next_cursor(session.senders.len(), session.rotation_cursor)?;
            if let Some(sender) = session.senders.iter_mut().find(|s| s.id == sender_id) {
                sender.usage_count += 1;
                sender.last_used_at = Some(Utc::now());
            }
            session.rotation_cursor = next;
            next
        };
        self.publish(SessionEvent::CursorAdvanced { cursor });
        Ok(cursor)
    }

    pub async fn add_sender(&self, sender: SenderCredential) -> SenderCredential {
        let count = {
            let mut session = self.inner.write().await;
            session.senders.push(sender.clone());
            session.senders.len()
        };
        self.publish(SessionEvent::SendersChanged { count });
        sender
    }

    pub async fn remove_sender(&self, id: &str) -> Option<SenderCredential> {
        let (removed, count) = {
            let mut session = self.inner.write().await;
            let idx = session.senders.iter().position(|s| s.id == id)?;
            let removed = session.senders.remove(idx);
            (removed, session.senders.len())
        };
        self.publish(SessionEvent::SendersChanged { count });
        Some(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(quota: u32) -> SessionContext {
        SessionContext::new(Session::new("demo", SenderProfile::default(), quota))
    }

    #[tokio::test]
    async fn test_consume_credit_floors_at_zero() {
        let ctx = context(1);
        assert!(ctx.has_quota().await);
        assert_eq!(ctx.consume_credit().await, 0);
        assert_eq!(ctx.consume_credit().await, 0);
        assert!(!ctx.has_quota().await);
    }

    #[tokio::test]
    async fn test_add_credits_publishes_event() {
        let ctx = context(0);
        let mut rx = ctx.subscribe();
        assert_eq!(ctx.add_credits(5).await, 5);
        assert_eq!(rx.recv().await.unwrap(), SessionEvent::QuotaChanged { quota: 5 });
    }

    #[tokio::test]
    async fn test_empty_pool_has_no_current_sender() {
        let ctx = context(0);
        assert_eq!(
            ctx.current_sender().await.unwrap_err(),
            RotationError::EmptyPool
        );
        assert_eq!(
            ctx.complete_turn("nobody").await.unwrap_err(),
            RotationError::EmptyPool
        );
    }

    #[tokio::test]
    async fn test_complete_turn_rotates_and_counts() {
        let ctx = context(0);
        let a = ctx.add_sender(SenderCredential::new("a@x.com", "ta")).await;
        let b = ctx.add_sender(SenderCredential::new("b@x.com", "tb")).await;

        assert_eq!(ctx.current_sender().await.unwrap().id, a.id);
        assert_eq!(ctx.complete_turn(&a.id).await.unwrap(), 1);
        assert_eq!(ctx.current_sender().await.unwrap().id, b.id);
        assert_eq!(ctx.complete_turn(&b.id).await.unwrap(), 0);

        let senders = ctx.senders().await;
        assert_eq!(senders[0].usage_count, 1);
        assert!(senders[0].last_used_at.is_some());
        assert_eq!(senders[1].usage_count, 1);
    }

    #[tokio::test]
    async fn test_remove_sender_keeps_cursor_in_range() {
        let ctx = context(0);
        let a = ctx.add_sender(SenderCredential::new("a@x.com", "ta")).await;
        let b = ctx.add_sender(SenderCredential::new("b@x.com", "tb")).await;
        ctx.complete_turn(&a.id).await.unwrap();

        ctx.remove_sender(&b.id).await.unwrap();
        // Cursor 1 over a pool of one wraps to the remaining sender.
        assert_eq!(ctx.current_sender().await.unwrap().id, a.id);
        assert!(ctx.remove_sender("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_rotation_ignores_sender_status() {
        let mut session = Session::new("demo", SenderProfile::default(), 0);
        let mut failed = SenderCredential::new("a@x.com", "ta");
        failed.status = crate::session::SenderStatus::Failed;
        session.senders = vec![failed.clone(), SenderCredential::new("b@x.com", "tb")];
        let ctx = SessionContext::new(session);

        assert_eq!(ctx.current_sender().await.unwrap().id, failed.id);
        assert_eq!(ctx.complete_turn(&failed.id).await.unwrap(), 1);
    }
}
