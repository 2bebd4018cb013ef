/// Inbound frame could not be turned into a chat message.
///
/// Recovered per connection: the sender gets a private rejection notice and
/// the connection stays open.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Payload is not JSON at all
    #[error("payload is not valid JSON: {0}")]
    Syntax(#[source] serde_json::Error),
    /// JSON, but not an object with a string `text` field
    #[error("payload has the wrong shape: {0}")]
    Shape(#[source] serde_json::Error),
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        use serde_json::error::Category;

        match err.classify() {
            Category::Data => DecodeError::Shape(err),
            Category::Syntax | Category::Eof | Category::Io => DecodeError::Syntax(err),
        }
    }
}

/// A frame could not be queued for one recipient.
///
/// Never propagates past the broadcast coordinator; the recipient is evicted
/// instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The recipient's writer is gone (socket closed or reset)
    #[error("recipient connection is closed")]
    Closed,
    /// The recipient is not draining its outbound queue fast enough
    #[error("recipient outbound queue is full")]
    QueueFull,
}

/// Transport-level failure on a single connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    #[error("transport error: {0}")]
    Transport(String),
}
