//! Server metrics for observability
//!
//! Runtime counters for connections, chat traffic and delivery health.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Server-wide metrics
#[derive(Debug, Default)]
pub struct ServerMetrics {
    // Connection metrics
    /// Currently active WebSocket connections
    pub active_connections: AtomicU64,
    /// Total connections since server start
    pub total_connections: AtomicU64,

    // Message metrics
    /// Valid chat messages received from clients
    pub messages_received: AtomicU64,
    /// Inbound frames rejected as malformed
    pub messages_rejected: AtomicU64,
    /// Broadcasts performed (chat messages and notices)
    pub broadcasts: AtomicU64,
    /// Frames queued to individual sessions
    pub frames_delivered: AtomicU64,

    // Error metrics
    /// Per-recipient delivery failures
    pub delivery_failures: AtomicU64,
    /// Sessions evicted after a delivery failure
    pub sessions_evicted: AtomicU64,

    // Replay metrics
    /// Number of history replays on join
    pub history_replays: AtomicU64,
    /// Total messages sent during replays
    pub history_messages_replayed: AtomicU64,

    /// Server start time (for uptime calculation)
    start_time: Option<Instant>,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    // Connection tracking
    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    // Message tracking
    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_rejected(&self) {
        self.messages_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn broadcast_completed(&self, delivered: usize, failed: usize) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        self.frames_delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.delivery_failures
            .fetch_add(failed as u64, Ordering::Relaxed);
    }

    pub fn frame_delivered(&self) {
        self.frames_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delivery_failed(&self) {
        self.delivery_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_evicted(&self) {
        self.sessions_evicted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn history_replayed(&self, messages: usize) {
        self.history_replays.fetch_add(1, Ordering::Relaxed);
        self.history_messages_replayed
            .fetch_add(messages as u64, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    /// Create a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            connections: ConnectionMetrics {
                active: self.active_connections.load(Ordering::Relaxed),
                total: self.total_connections.load(Ordering::Relaxed),
            },
            messages: MessageMetrics {
                received: self.messages_received.load(Ordering::Relaxed),
                rejected: self.messages_rejected.load(Ordering::Relaxed),
                broadcasts: self.broadcasts.load(Ordering::Relaxed),
                frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            },
            errors: ErrorMetrics {
                delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
                sessions_evicted: self.sessions_evicted.load(Ordering::Relaxed),
            },
            replay: ReplayMetrics {
                replays: self.history_replays.load(Ordering::Relaxed),
                messages: self.history_messages_replayed.load(Ordering::Relaxed),
            },
        }
    }
}

/// Serializable snapshot of metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub connections: ConnectionMetrics,
    pub messages: MessageMetrics,
    pub errors: ErrorMetrics,
    pub replay: ReplayMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub active: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMetrics {
    pub received: u64,
    pub rejected: u64,
    pub broadcasts: u64,
    pub frames_delivered: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMetrics {
    pub delivery_failures: u64,
    pub sessions_evicted: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayMetrics {
    pub replays: u64,
    pub messages: u64,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub connections: u64,
    pub registered_sessions: u64,
    pub stored_messages: u64,
    pub uptime_secs: u64,
}
