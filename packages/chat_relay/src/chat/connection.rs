//! Connection abstraction consumed by the session handler.
//!
//! A connection splits into a sink of outbound text frames and a stream of
//! inbound events. Closing the sink closes the connection.

use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt, future};
use std::pin::Pin;

use super::error::ConnectionError;

/// One inbound event from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// UTF-8 text frame
    Text(String),
    /// Binary frame; never a valid chat message
    Binary,
    /// Peer sent a close frame
    Close,
    /// Ping or pong; carries nothing for the chat
    Other,
}

pub type FrameSink = Pin<Box<dyn Sink<String, Error = ConnectionError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Inbound, ConnectionError>> + Send>>;

/// An accepted bidirectional connection.
pub trait Connection: Send + 'static {
    fn split(self) -> (FrameSink, FrameStream);
}

impl Connection for WebSocket {
    fn split(self) -> (FrameSink, FrameStream) {
        let (ws_sender, ws_receiver) = StreamExt::split(self);

        let sink = ws_sender
            .sink_map_err(|e| ConnectionError::Transport(e.to_string()))
            .with(|text: String| {
                future::ready(Ok::<_, ConnectionError>(Message::Text(text.into())))
            });

        let stream = ws_receiver.map(|msg| match msg {
            Ok(Message::Text(text)) => Ok(Inbound::Text(text.as_str().to_owned())),
            Ok(Message::Binary(_)) => Ok(Inbound::Binary),
            Ok(Message::Close(_)) => Ok(Inbound::Close),
            Ok(_) => Ok(Inbound::Other),
            Err(e) => Err(ConnectionError::Transport(e.to_string())),
        });

        (Box::pin(sink), Box::pin(stream))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory connection pair for driving the session handler in tests.

    use super::*;
    use futures::channel::mpsc;
    use std::time::Duration;

    pub(crate) struct MemoryConnection {
        outbound: mpsc::UnboundedSender<String>,
        inbound: mpsc::UnboundedReceiver<Result<Inbound, ConnectionError>>,
    }

    /// The client side of a [`MemoryConnection`].
    pub(crate) struct MemoryPeer {
        to_server: Option<mpsc::UnboundedSender<Result<Inbound, ConnectionError>>>,
        from_server: mpsc::UnboundedReceiver<String>,
    }

    pub(crate) fn memory_pair() -> (MemoryConnection, MemoryPeer) {
        let (outbound, from_server) = mpsc::unbounded();
        let (to_server, inbound) = mpsc::unbounded();
        (
            MemoryConnection { outbound, inbound },
            MemoryPeer {
                to_server: Some(to_server),
                from_server,
            },
        )
    }

    impl Connection for MemoryConnection {
        fn split(self) -> (FrameSink, FrameStream) {
            let sink = self
                .outbound
                .sink_map_err(|e| ConnectionError::Transport(e.to_string()));
            (Box::pin(sink), Box::pin(self.inbound))
        }
    }

    const RECV_TIMEOUT: Duration = Duration::from_secs(5);

    impl MemoryPeer {
        pub(crate) fn send_text(&self, text: &str) {
            if let Some(tx) = &self.to_server {
                tx.unbounded_send(Ok(Inbound::Text(text.to_string())))
                    .expect("server side dropped");
            }
        }

        pub(crate) fn send_event(&self, event: Result<Inbound, ConnectionError>) {
            if let Some(tx) = &self.to_server {
                tx.unbounded_send(event).expect("server side dropped");
            }
        }

        /// Simulate the peer going away without a close frame.
        pub(crate) fn hang_up(&mut self) {
            self.to_server.take();
        }

        /// Next frame from the server; `None` once the server closed.
        pub(crate) async fn recv(&mut self) -> Option<String> {
            tokio::time::timeout(RECV_TIMEOUT, self.from_server.next())
                .await
                .expect("timed out waiting for server frame")
        }

        /// Assert nothing arrives within a short window.
        pub(crate) async fn expect_silence(&mut self) {
            let res =
                tokio::time::timeout(Duration::from_millis(100), self.from_server.next()).await;
            assert!(res.is_err(), "unexpected frame: {:?}", res);
        }
    }
}
