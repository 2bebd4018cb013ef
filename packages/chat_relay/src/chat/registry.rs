//! Session Registry
//!
//! Tracks every live connection. Shared by all connection tasks; all access
//! goes through the internal lock, and fan-out iterates a snapshot.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use uuid::Uuid;

use super::error::DeliveryError;
use super::protocol::Frame;

/// Identity of one connection. Unique even when usernames repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// One active connection and the username it joined with.
///
/// The outbox is the only way to reach the socket; it is drained by the
/// connection's writer task. Cancelling `closed` tells the connection task to
/// shut down.
pub struct Session {
    id: SessionId,
    username: String,
    outbox: mpsc::Sender<Frame>,
    closed: CancellationToken,
}

impl Session {
    pub fn new(
        username: impl Into<String>,
        outbox: mpsc::Sender<Frame>,
        closed: CancellationToken,
    ) -> Self {
        Self {
            id: SessionId::new(),
            username: username.into(),
            outbox,
            closed,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Queue a frame without waiting.
    pub fn send(&self, frame: Frame) -> Result<(), DeliveryError> {
        self.outbox.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Ask the connection task to close this session.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the session has been asked to close.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.closed.cancelled()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// The set of currently registered sessions, keyed by connection identity.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, session: Arc<Session>) {
        self.sessions.write().await.insert(session.id(), session);
    }

    /// Remove a session. Returns false if it was already gone.
    pub async fn deregister(&self, id: SessionId) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    /// Snapshot of the registered sessions at call time.
    pub async fn all(&self) -> Vec<Arc<Session>> {
        self.sessions.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    #[cfg(test)]
    pub async fn contains(&self, id: SessionId) -> bool {
        self.sessions.read().await.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_session(username: &str) -> (Arc<Session>, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(8);
        (
            Arc::new(Session::new(username, tx, CancellationToken::new())),
            rx,
        )
    }

    #[tokio::test]
    async fn test_register_and_enumerate() {
        let registry = SessionRegistry::new();
        let (a, _rx_a) = make_session("alice");
        let (b, _rx_b) = make_session("bob");
        registry.register(a.clone()).await;
        registry.register(b.clone()).await;

        let mut names: Vec<_> = registry
            .all()
            .await
            .iter()
            .map(|s| s.username().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["alice", "bob"]);
        assert!(registry.contains(a.id()).await);
    }

    #[tokio::test]
    async fn test_duplicate_usernames_are_distinct_sessions() {
        let registry = SessionRegistry::new();
        let (first, _rx1) = make_session("dave");
        let (second, _rx2) = make_session("dave");
        registry.register(first.clone()).await;
        registry.register(second.clone()).await;
        assert_eq!(registry.len().await, 2);

        registry.deregister(first.id()).await;
        assert!(registry.contains(second.id()).await);
    }

    #[tokio::test]
    async fn test_deregister_is_idempotent() {
        let registry = SessionRegistry::new();
        let (a, _rx_a) = make_session("alice");
        let (b, _rx_b) = make_session("bob");
        registry.register(a.clone()).await;
        registry.register(b.clone()).await;

        assert!(registry.deregister(a.id()).await);
        assert!(!registry.deregister(a.id()).await);
        assert_eq!(registry.len().await, 1);
        assert!(registry.contains(b.id()).await);
    }

    #[tokio::test]
    async fn test_deregister_unknown_session_is_noop() {
        let registry = SessionRegistry::new();
        let (a, _rx) = make_session("alice");
        assert!(!registry.deregister(a.id()).await);
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn test_snapshot_ignores_later_mutation() {
        let registry = SessionRegistry::new();
        let (a, _rx_a) = make_session("alice");
        registry.register(a.clone()).await;

        let snapshot = registry.all().await;
        let (b, _rx_b) = make_session("bob");
        registry.register(b).await;
        registry.deregister(a.id()).await;

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id(), a.id());
    }

    #[tokio::test]
    async fn test_concurrent_register_and_deregister() {
        let registry = Arc::new(SessionRegistry::new());
        let mut handles = Vec::new();
        for i in 0..32 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let (session, _rx) = make_session(&format!("user-{}", i));
                registry.register(session.clone()).await;
                let _ = registry.all().await;
                if i % 2 == 0 {
                    // Racing removals from two sides
                    let r2 = registry.clone();
                    let id = session.id();
                    let other = tokio::spawn(async move { r2.deregister(id).await });
                    let mine = registry.deregister(id).await;
                    let theirs = other.await.unwrap();
                    assert!(mine ^ theirs, "exactly one removal should succeed");
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(registry.len().await, 16);
    }

    #[tokio::test]
    async fn test_session_send_reports_closed_and_full() {
        let (tx, rx) = mpsc::channel(1);
        let session = Session::new("alice", tx, CancellationToken::new());

        assert!(session.send(Frame::from("one")).is_ok());
        assert_eq!(session.send(Frame::from("two")), Err(DeliveryError::QueueFull));

        drop(rx);
        assert_eq!(session.send(Frame::from("three")), Err(DeliveryError::Closed));
    }

    #[tokio::test]
    async fn test_session_close_signals_waiters() {
        let (session, _rx) = make_session("alice");
        assert!(!session.is_closed());
        session.close();
        session.closed().await;
        assert!(session.is_closed());
    }
}
