use axum::{
    extract::{Path, State, WebSocketUpgrade},
    response::Response,
};

use crate::AppState;
use crate::chat::{self, SessionContext};

/// Chat WebSocket handler - one connection per client, bound to the
/// username in the path
pub async fn chat_websocket_handler(
    State(state): State<AppState>,
    Path(username): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let ctx = SessionContext {
        coordinator: state.coordinator.clone(),
        metrics: state.metrics.clone(),
        send_channel_capacity: state.server_config.websocket.send_channel_capacity,
        idle_timeout: state.server_config.websocket.idle_timeout,
        shutdown: state.shutdown.clone(),
    };

    ws.on_upgrade(move |socket| chat::run_session(socket, username, ctx))
}
