//! Broadcast Coordinator
//!
//! Single writer for the message store and the only path by which frames fan
//! out to registered sessions.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::metrics::ServerMetrics;

use super::error::DeliveryError;
use super::protocol::{ChatMessage, Frame};
use super::registry::{Session, SessionId, SessionRegistry};
use super::store::MessageStore;

/// Outcome of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Sessions the frame was queued to
    pub delivered: usize,
    /// Sessions that could not take the frame and were evicted
    pub failed: Vec<(SessionId, DeliveryError)>,
}

pub struct BroadcastCoordinator {
    store: MessageStore,
    registry: SessionRegistry,
    /// Serializes store appends, joins and fan-out so every session sees
    /// frames in store order.
    delivery: Mutex<()>,
    metrics: Arc<ServerMetrics>,
}

impl BroadcastCoordinator {
    pub fn new(
        store: MessageStore,
        registry: SessionRegistry,
        metrics: Arc<ServerMetrics>,
    ) -> Self {
        Self {
            store,
            registry,
            delivery: Mutex::new(()),
            metrics,
        }
    }

    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Register a session and return the history it must replay.
    ///
    /// Runs under the delivery lock: every message is either in the returned
    /// history or queued to the session afterwards, never both.
    pub async fn join(&self, session: Arc<Session>) -> Vec<ChatMessage> {
        let _serial = self.delivery.lock().await;
        let history = self.store.list_all().await;
        debug!(
            session = %session.id(),
            username = %session.username(),
            history = history.len(),
            "Session joined"
        );
        self.registry.register(session).await;
        history
    }

    /// Remove a session from fan-out. Returns false if it was already gone.
    pub async fn leave(&self, id: SessionId) -> bool {
        self.registry.deregister(id).await
    }

    /// Record a chat message and send it to every registered session.
    pub async fn deliver(&self, message: ChatMessage) -> DeliveryReport {
        let (report, failed) = {
            let _serial = self.delivery.lock().await;
            self.store.append(message.clone()).await;
            let recipients = self.registry.all().await;
            fan_out(&recipients, &Frame::Chat(message))
        };
        self.finish(report, failed).await
    }

    /// Send a control notice to every registered session. Notices are not
    /// chat history and are never stored.
    pub async fn announce(&self, notice: impl Into<String>) -> DeliveryReport {
        let frame = Frame::Notice(notice.into());
        let (report, failed) = {
            let _serial = self.delivery.lock().await;
            let recipients = self.registry.all().await;
            fan_out(&recipients, &frame)
        };
        self.finish(report, failed).await
    }

    /// Send a frame to exactly one session without touching the store.
    ///
    /// A target that cannot take the frame is closed, the same as a failed
    /// broadcast recipient; its connection task deregisters it on the way out.
    pub fn send_private(
        &self,
        frame: impl Into<Frame>,
        target: &Session,
    ) -> Result<(), DeliveryError> {
        match target.send(frame.into()) {
            Ok(()) => {
                self.metrics.frame_delivered();
                Ok(())
            }
            Err(e) => {
                self.metrics.delivery_failed();
                if !target.is_closed() {
                    self.metrics.session_evicted();
                    warn!(
                        session = %target.id(),
                        username = %target.username(),
                        "Evicting session after failed private send: {}", e
                    );
                    target.close();
                }
                Err(e)
            }
        }
    }

    /// Evict failed recipients once the snapshot is no longer being walked.
    async fn finish(
        &self,
        report: DeliveryReport,
        failed: Vec<Arc<Session>>,
    ) -> DeliveryReport {
        self.metrics
            .broadcast_completed(report.delivered, report.failed.len());

        for session in failed {
            if self.registry.deregister(session.id()).await {
                self.metrics.session_evicted();
                warn!(
                    session = %session.id(),
                    username = %session.username(),
                    "Evicting session after failed delivery"
                );
            }
            session.close();
        }
        report
    }
}

fn fan_out(recipients: &[Arc<Session>], frame: &Frame) -> (DeliveryReport, Vec<Arc<Session>>) {
    let mut report = DeliveryReport::default();
    let mut failed = Vec::new();
    for session in recipients {
        match session.send(frame.clone()) {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                debug!(session = %session.id(), "Delivery failed: {}", e);
                report.failed.push((session.id(), e));
                failed.push(session.clone());
            }
        }
    }
    (report, failed)
}
