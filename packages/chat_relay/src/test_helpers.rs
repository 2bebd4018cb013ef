use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::AppState;
use crate::chat::{BroadcastCoordinator, MessageStore, SessionRegistry, demo_history};
use crate::config::{FileConfig, ServerConfig};
use crate::metrics::ServerMetrics;

/// Build a fully-wired `AppState` whose store holds the demo history.
pub fn test_app_state() -> AppState {
    let metrics = Arc::new(ServerMetrics::new());
    let coordinator = Arc::new(BroadcastCoordinator::new(
        MessageStore::with_history(None, demo_history()),
        SessionRegistry::new(),
        metrics.clone(),
    ));

    AppState {
        coordinator,
        server_config: Arc::new(ServerConfig::from_file(&FileConfig::default())),
        metrics,
        shutdown: CancellationToken::new(),
    }
}
