//! `chat-relay connect`: join a relay from the terminal.
//!
//! Each stdin line is sent as a chat message; every frame received is
//! printed to stdout. Ctrl-D leaves the chat.

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use crate::chat::{ClientMessage, Frame};

/// WebSocket URL for `username` on the relay at `server`.
fn chat_url(server: &str, username: &str) -> String {
    format!(
        "{}/ws/{}",
        server.trim_end_matches('/'),
        urlencoding::encode(username)
    )
}

/// Human-readable rendering of one received frame.
fn render_frame(raw: &str) -> String {
    match Frame::parse(raw) {
        Frame::Chat(message) => format!("{}: {}", message.username, message.text),
        Frame::Notice(text) => format!("* {}", text),
    }
}

pub async fn connect_command(server: &str, username: &str) -> Result<()> {
    anyhow::ensure!(!username.is_empty(), "username must not be empty");

    let url = chat_url(server, username);
    let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
        .await
        .with_context(|| format!("Failed to connect to {}", url))?;
    eprintln!("[connected to {} as {}; Ctrl-D to leave]", server, username);

    let (mut ws_write, mut ws_read) = ws_stream.split();

    let reader = async {
        while let Some(msg) = ws_read.next().await {
            match msg.context("WebSocket error")? {
                Message::Text(text) => println!("{}", render_frame(text.as_str())),
                Message::Close(_) => break,
                other => debug!("Ignoring frame: {:?}", other),
            }
        }
        Ok::<_, anyhow::Error>(())
    };

    let writer = async {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
            if line.trim().is_empty() {
                continue;
            }
            let payload = serde_json::to_string(&ClientMessage { text: line })?;
            ws_write
                .send(Message::text(payload))
                .await
                .context("Failed to send message")?;
        }
        // Best-effort close; the server treats a dropped socket the same way
        let _ = ws_write.send(Message::Close(None)).await;
        Ok::<_, anyhow::Error>(())
    };

    tokio::select! {
        res = reader => res?,
        res = writer => res?,
    }

    eprintln!("[disconnected]");
    Ok(())
}
