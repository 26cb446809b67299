//! Relay WebSocket route configuration.

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::relay::relay_handler;
use crate::state::AppState;

/// Create the relay WebSocket router.
///
/// # Endpoint
///
/// `GET /ws` - WebSocket upgrade for a relay session
///
/// # Protocol
///
/// After the upgrade, clients send JSON messages tagged by `type`:
/// `start_session`, `audio_data` (with an `audioData` payload), and
/// `end_session`. The server responds with `session_started`,
/// `gemini_response`, `gemini_disconnected`, and `error` events.
///
/// # Example
///
/// ```json
/// // Client opens a session
/// {"type": "start_session"}
///
/// // Server confirms once the upstream session is configured
/// {"type": "session_started"}
///
/// // Client streams audio chunks
/// {"type": "audio_data", "audioData": "<base64>"}
/// ```
pub fn create_relay_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws", get(relay_handler))
        .layer(TraceLayer::new_for_http())
}
