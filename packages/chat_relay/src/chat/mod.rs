//! Chat Relay Core
//!
//! Every connected client gets:
//! - The full message history on join, in store order
//! - Every chat message broadcast afterwards, including its own
//! - A plain-text notice when another client leaves

mod connection;
mod coordinator;
mod error;
mod handler;
mod protocol;
mod registry;
mod store;

pub use coordinator::BroadcastCoordinator;
pub use handler::{SessionContext, run_session};
#[cfg(test)]
pub use protocol::ChatMessage;
pub use protocol::{ClientMessage, Frame};
pub use registry::SessionRegistry;
pub use store::{MessageStore, demo_history};
