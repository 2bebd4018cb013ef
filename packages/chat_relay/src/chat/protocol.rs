//! Chat Wire Protocol
//!
//! Two outbound frame kinds share one socket: chat payloads are JSON objects
//! `{"username", "text"}`, control notices (rejections, departures) are plain
//! text. Clients tell them apart by content.

use serde::{Deserialize, Serialize};

use super::error::DecodeError;

/// Sent privately to a client whose frame failed to decode.
pub const INVALID_MESSAGE_NOTICE: &str = "Invalid message";

/// Notice broadcast when a session leaves.
pub fn departure_notice(username: &str) -> String {
    format!("Client {} left the chat", username)
}

/// One chat line, as stored and as sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub username: String,
    pub text: String,
}

impl ChatMessage {
    pub fn new(username: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            text: text.into(),
        }
    }
}

/// Messages sent FROM the client TO the server.
///
/// Unknown fields are ignored; `text` is required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMessage {
    pub text: String,
}

/// Decode one inbound text frame into the message text.
pub fn decode_client_message(raw: &str) -> Result<ClientMessage, DecodeError> {
    Ok(serde_json::from_str::<ClientMessage>(raw)?)
}

/// Frames sent FROM the server TO a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Chat payload, live or replayed
    Chat(ChatMessage),
    /// Plain-text control notice
    Notice(String),
}

impl Frame {
    /// Render the frame as the text that goes on the wire.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        match self {
            Frame::Chat(message) => serde_json::to_string(message),
            Frame::Notice(text) => Ok(text.clone()),
        }
    }

    /// Classify a received text frame. Anything that is not a chat object is
    /// a notice.
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<ChatMessage>(raw) {
            Ok(message) => Frame::Chat(message),
            Err(_) => Frame::Notice(raw.to_string()),
        }
    }
}

impl From<ChatMessage> for Frame {
    fn from(message: ChatMessage) -> Self {
        Frame::Chat(message)
    }
}

impl From<String> for Frame {
    fn from(text: String) -> Self {
        Frame::Notice(text)
    }
}

impl From<&str> for Frame {
    fn from(text: &str) -> Self {
        Frame::Notice(text.to_string())
    }
}
