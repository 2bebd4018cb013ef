//! Command-line client for talking to a running relay.

mod connect;

pub use connect::connect_command;
