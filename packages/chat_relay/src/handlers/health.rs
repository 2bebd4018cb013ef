use axum::{Json, extract::State, response::IntoResponse};

use crate::AppState;
use crate::metrics;

/// Health check endpoint - returns server status
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.metrics.snapshot();
    let registered = state.coordinator.registry().len().await as u64;
    let stored = state.coordinator.store().len().await as u64;

    let status = if snapshot.errors.delivery_failures == 0 {
        "healthy"
    } else {
        "degraded"
    };

    Json(metrics::HealthStatus {
        status: status.to_string(),
        connections: snapshot.connections.active,
        registered_sessions: registered,
        stored_messages: stored,
        uptime_secs: snapshot.uptime_secs,
    })
}

/// Metrics endpoint - returns detailed server metrics
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

/// Liveness probe - returns 200 if the server is running
pub async fn health_live_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatMessage;
    use axum::{Router, body::Body, http::Request, http::StatusCode, routing::get};
    use tower::ServiceExt;

    async fn get_json(app: Router, uri: &str) -> serde_json::Value {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn test_router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/health/live", get(health_live_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state)
    }

    #[tokio::test]
    async fn test_health_reports_store_and_sessions() {
        let state = crate::test_helpers::test_app_state();
        state
            .coordinator
            .deliver(ChatMessage::new("Dave", "hi"))
            .await;

        let json = get_json(test_router(state), "/health").await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["stored_messages"], 7);
        assert_eq!(json["registered_sessions"], 0);
    }

    #[tokio::test]
    async fn test_health_live() {
        let state = crate::test_helpers::test_app_state();
        let json = get_json(test_router(state), "/health/live").await;
        assert_eq!(json["status"], "alive");
    }

    #[tokio::test]
    async fn test_metrics_snapshot() {
        let state = crate::test_helpers::test_app_state();
        state.metrics.message_received();

        let json = get_json(test_router(state), "/metrics").await;
        assert_eq!(json["messages"]["received"], 1);
        assert_eq!(json["connections"]["active"], 0);
    }
}
