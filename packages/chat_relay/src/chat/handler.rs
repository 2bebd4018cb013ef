//! Chat Session Handler
//!
//! Per-connection control loop: join and replay, read and broadcast, then
//! leave and announce the departure.

use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::metrics::ServerMetrics;

use super::connection::{Connection, FrameSink, FrameStream, Inbound};
use super::coordinator::BroadcastCoordinator;
use super::error::ConnectionError;
use super::protocol::{
    ChatMessage, Frame, INVALID_MESSAGE_NOTICE, decode_client_message, departure_notice,
};
use super::registry::Session;

/// Everything a connection task needs from the server.
#[derive(Clone)]
pub struct SessionContext {
    pub coordinator: Arc<BroadcastCoordinator>,
    pub metrics: Arc<ServerMetrics>,
    /// Outbound queue depth per session
    pub send_channel_capacity: usize,
    /// Close the session after this long without an inbound frame (None = never)
    pub idle_timeout: Option<Duration>,
    /// Cancelled on server shutdown
    pub shutdown: CancellationToken,
}

/// Why a session left the Active state.
#[derive(Debug)]
enum CloseReason {
    PeerClosed,
    Transport(ConnectionError),
    IdleTimeout,
    /// Evicted by the coordinator, writer failure, or server shutdown
    Cancelled,
}

/// Drive one chat connection from accept to departure.
pub async fn run_session<C: Connection>(connection: C, username: String, ctx: SessionContext) {
    ctx.metrics.connection_opened();

    let (mut sink, mut stream) = connection.split();
    let (outbox_tx, outbox_rx) = mpsc::channel::<Frame>(ctx.send_channel_capacity.max(1));
    let session = Arc::new(Session::new(
        username,
        outbox_tx,
        ctx.shutdown.child_token(),
    ));
    let conn_id = session.id();
    info!(conn_id = %conn_id, username = %session.username(), "New chat connection");

    // Active: register, then replay the store to this connection only.
    // Broadcasts that land meanwhile wait in the outbox.
    let history = ctx.coordinator.join(session.clone()).await;
    match replay_history(&mut sink, &history).await {
        Ok(()) => ctx.metrics.history_replayed(history.len()),
        Err(e) => {
            warn!(conn_id = %conn_id, "History replay failed: {}", e);
            session.close();
        }
    }

    let writer = tokio::spawn(write_frames(sink, outbox_rx, session.clone()));

    let reason = loop {
        let next = tokio::select! {
            biased;
            _ = session.closed() => break CloseReason::Cancelled,
            next = next_inbound(&mut stream, ctx.idle_timeout) => next,
        };
        match next {
            Ok(Some(Inbound::Text(raw))) => handle_text(&ctx, &session, &raw).await,
            Ok(Some(Inbound::Binary)) => reject(&ctx, &session, "binary frame"),
            Ok(Some(Inbound::Other)) => {}
            Ok(Some(Inbound::Close)) | Ok(None) => break CloseReason::PeerClosed,
            Err(reason) => break reason,
        }
    };

    // Closing: deregister before the socket goes away, then tell everyone else
    info!(conn_id = %conn_id, username = %session.username(), ?reason, "Chat connection closing");
    if !ctx.coordinator.leave(conn_id).await {
        debug!(conn_id = %conn_id, "Session was already deregistered");
    }
    session.close();
    match writer.await {
        Ok(mut sink) => {
            if let Err(e) = sink.close().await {
                debug!(conn_id = %conn_id, "Error closing connection: {}", e);
            }
        }
        Err(e) => error!(conn_id = %conn_id, "Writer task failed: {}", e),
    }
    drop(stream);

    let report = ctx
        .coordinator
        .announce(departure_notice(session.username()))
        .await;
    debug!(
        conn_id = %conn_id,
        notified = report.delivered,
        "Announced departure"
    );
    ctx.metrics.connection_closed();
}

async fn replay_history(
    sink: &mut FrameSink,
    history: &[ChatMessage],
) -> Result<(), ConnectionError> {
    for message in history {
        let text = serde_json::to_string(message)
            .map_err(|e| ConnectionError::Transport(e.to_string()))?;
        sink.feed(text).await?;
    }
    sink.flush().await
}

/// Drain the session outbox onto the socket until the session closes or the
/// socket fails. Hands the sink back so the caller can close it.
async fn write_frames(
    mut sink: FrameSink,
    mut outbox: mpsc::Receiver<Frame>,
    session: Arc<Session>,
) -> FrameSink {
    loop {
        let frame = tokio::select! {
            biased;
            _ = session.closed() => break,
            frame = outbox.recv() => match frame {
                Some(f) => f,
                None => break,
            },
        };
        let text = match frame.encode() {
            Ok(t) => t,
            Err(e) => {
                error!("Failed to serialize frame: {}", e);
                continue;
            }
        };
        if let Err(e) = sink.send(text).await {
            debug!(conn_id = %session.id(), "Send failed, closing session: {}", e);
            session.close();
            break;
        }
    }
    sink
}

async fn next_inbound(
    stream: &mut FrameStream,
    idle_timeout: Option<Duration>,
) -> Result<Option<Inbound>, CloseReason> {
    let next = match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, stream.next())
            .await
            .map_err(|_| CloseReason::IdleTimeout)?,
        None => stream.next().await,
    };
    next.transpose().map_err(CloseReason::Transport)
}

async fn handle_text(ctx: &SessionContext, session: &Session, raw: &str) {
    match decode_client_message(raw) {
        Ok(inbound) => {
            ctx.metrics.message_received();
            // Username is bound at connect time, never taken from the payload
            let message = ChatMessage::new(session.username(), inbound.text);
            let report = ctx.coordinator.deliver(message).await;
            debug!(
                conn_id = %session.id(),
                delivered = report.delivered,
                failed = report.failed.len(),
                "Broadcast chat message"
            );
        }
        Err(e) => reject(ctx, session, &e.to_string()),
    }
}

/// Tell the sender, and only the sender, that its frame was not a chat message.
fn reject(ctx: &SessionContext, session: &Session, cause: &str) {
    ctx.metrics.message_rejected();
    debug!(conn_id = %session.id(), "Rejected inbound frame: {}", cause);
    if let Err(e) = ctx.coordinator.send_private(INVALID_MESSAGE_NOTICE, session) {
        warn!(conn_id = %session.id(), "Failed to send rejection notice: {}", e);
    }
}
