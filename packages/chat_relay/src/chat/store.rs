//! Message Store
//!
//! Append-only chat history, replayed to every session that joins.

use std::collections::VecDeque;
use tokio::sync::RwLock;
use tracing::debug;

use super::protocol::ChatMessage;

/// Ordered in-memory history of chat messages.
///
/// Unbounded unless a capacity is given, in which case the oldest message is
/// evicted once the store is full.
pub struct MessageStore {
    messages: RwLock<VecDeque<ChatMessage>>,
    capacity: Option<usize>,
}

impl MessageStore {
    pub fn new(capacity: Option<usize>) -> Self {
        Self::with_history(capacity, Vec::new())
    }

    /// Create a store that already holds `history`, oldest first.
    pub fn with_history(capacity: Option<usize>, history: Vec<ChatMessage>) -> Self {
        let capacity = capacity.filter(|c| *c > 0);
        let mut messages: VecDeque<ChatMessage> = history.into();
        if let Some(cap) = capacity {
            while messages.len() > cap {
                messages.pop_front();
            }
        }
        Self {
            messages: RwLock::new(messages),
            capacity,
        }
    }

    pub async fn append(&self, message: ChatMessage) {
        let mut messages = self.messages.write().await;
        if let Some(cap) = self.capacity {
            while messages.len() >= cap {
                if let Some(evicted) = messages.pop_front() {
                    debug!(username = %evicted.username, "Evicted oldest message from store");
                }
            }
        }
        messages.push_back(message);
    }

    /// Snapshot of every stored message in insertion order.
    pub async fn list_all(&self) -> Vec<ChatMessage> {
        self.messages.read().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new(None)
    }
}

/// The six messages a fresh server starts with.
pub fn demo_history() -> Vec<ChatMessage> {
    [
        ("John Doe", "Hello"),
        ("Alice", "How are you?"),
        ("Bob", "Good morning!"),
        ("Charlie", "What's up?"),
        ("Eve", "Nice weather today!"),
        ("Frank", "Any plans for the weekend?"),
    ]
    .into_iter()
    .map(|(username, text)| ChatMessage::new(username, text))
    .collect()
}
