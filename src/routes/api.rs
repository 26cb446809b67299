//! REST API route configuration.

use std::sync::Arc;

use axum::{Router, routing::get};

use crate::handlers::api::health_check;
use crate::state::AppState;

/// Create the REST API router.
///
/// # Endpoints
///
/// `GET /health` - Liveness status with timestamp and connection count
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check))
}
