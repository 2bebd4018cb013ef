use anyhow::{Context, Result};
use axum::{Router, routing::get};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::{net::SocketAddr, sync::Arc};
use tokio_util::sync::CancellationToken;
use tower_http::trace::MakeSpan;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::prelude::*;
use uuid::Uuid;

mod chat;
mod cli;
mod config;
mod handlers;
mod metrics;
#[cfg(test)]
mod test_helpers;

use crate::chat::{BroadcastCoordinator, MessageStore, SessionRegistry, demo_history};
use crate::config::{FileConfig, ServerConfig};
use crate::metrics::ServerMetrics;

/// Custom span maker that adds a unique request ID to each incoming request
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

#[derive(Parser)]
#[command(name = "chat-relay")]
#[command(about = "Real-time WebSocket chat relay")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay server in the foreground
    Server(ServerArgs),

    /// Join a running relay from the terminal
    Connect(ConnectArgs),
}

#[derive(Parser)]
struct ServerArgs {
    /// Port for the web server (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (overrides the config file)
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Path to the TOML config file
    #[arg(short, long, default_value = "chat_relay.toml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Parser)]
struct ConnectArgs {
    /// Username to join as
    username: String,

    /// Relay base URL
    #[arg(short, long, default_value = "ws://127.0.0.1:8000")]
    server: String,
}

/// Process-wide state, constructed once in `run_server` and shared by every
/// request handler.
#[derive(Clone)]
pub(crate) struct AppState {
    /// Owns the message store and the session registry
    pub coordinator: Arc<BroadcastCoordinator>,
    /// Server runtime configuration
    pub server_config: Arc<ServerConfig>,
    /// Server metrics for observability
    pub metrics: Arc<ServerMetrics>,
    /// Cancelled once on shutdown; every session holds a child token
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(server_config: ServerConfig) -> Self {
        let metrics = Arc::new(ServerMetrics::new());

        let history = if server_config.store.seed_demo_history {
            demo_history()
        } else {
            Vec::new()
        };
        let store = MessageStore::with_history(server_config.store.max_messages, history);
        let coordinator = Arc::new(BroadcastCoordinator::new(
            store,
            SessionRegistry::new(),
            metrics.clone(),
        ));

        Self {
            coordinator,
            server_config: Arc::new(server_config),
            metrics,
            shutdown: CancellationToken::new(),
        }
    }
}

/// All HTTP and WebSocket routes.
pub(crate) fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws/{username}", get(handlers::chat_websocket_handler))
        // Health endpoints
        .route("/health", get(handlers::health_handler))
        .route("/health/live", get(handlers::health_live_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => run_server(args).await,
        Commands::Connect(args) => cli::connect_command(&args.server, &args.username).await,
    }
}

async fn run_server(args: ServerArgs) -> Result<()> {
    // Setup logging
    let default_directive = if args.debug {
        "chat_relay=debug,tower_http=debug,info"
    } else {
        "chat_relay=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    info!("Starting chat relay");

    let file_config: FileConfig = config::load_config(&args.config)
        .extract()
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    let host = args.host.unwrap_or_else(|| file_config.server.host.clone());
    let port = args.port.unwrap_or(file_config.server.port);

    let server_config = ServerConfig::from_file(&file_config);
    let app_state = AppState::new(server_config);
    info!(
        "Server config: send_queue={}, idle_timeout={:?}, max_messages={:?}, history={}",
        app_state.server_config.websocket.send_channel_capacity,
        app_state.server_config.websocket.idle_timeout,
        app_state.coordinator.store().capacity(),
        app_state.coordinator.store().len().await
    );

    let shutdown = app_state.shutdown.clone();
    let app = build_router(app_state);

    let addr = format!("{}:{}", host, port)
        .parse::<SocketAddr>()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let actual_addr = listener.local_addr()?;

    info!("Chat relay listening on http://{}", actual_addr);
    info!("  GET /ws/{{username}}  - WebSocket chat connection");
    info!("  GET /health          - Health status");
    info!("  GET /metrics         - Server metrics");

    // Create shutdown signal handler
    let shutdown_signal = {
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Received shutdown signal, closing sessions...");
            shutdown.cancel();
        }
    };

    // Run server with graceful shutdown
    let server_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error");

    shutdown.cancel();
    info!("Shutdown complete");
    server_result
}
