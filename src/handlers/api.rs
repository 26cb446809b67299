//! REST API handlers.

use std::sync::Arc;

use axum::{Json, extract::State};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::state::AppState;

/// Health check response body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Liveness indicator, always "ok" when the process is serving
    pub status: &'static str,
    /// Current time, RFC 3339
    pub timestamp: String,
    /// Number of connected clients
    pub connections: usize,
}

/// Liveness endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();

    Json(HealthResponse {
        status: "ok",
        timestamp,
        connections: state.registry.active_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    #[tokio::test]
    async fn test_health_check_reports_ok() {
        let state = AppState::new(ServerConfig::default());

        let Json(body) = health_check(State(state)).await;
        assert_eq!(body.status, "ok");
        assert_eq!(body.connections, 0);
        assert!(body.timestamp.contains('T'));
    }
}
