//! Base trait and types for upstream streaming sessions.
//!
//! An upstream session wraps one live connection to the streaming
//! conversational API. Instead of registering per-concern callbacks, a
//! connected session hands its owner a single event stream: every transport
//! occurrence (readiness, decoded frame, failure, remote close) arrives as
//! one [`UpstreamEvent`] on an `mpsc` channel, so the owning state machine
//! consumes the whole session lifecycle with one `match`.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur on the upstream connection.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The upstream API credential is not configured
    #[error("Gemini API key is not configured")]
    MissingCredential,

    /// Establishing the connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The connection dropped or a frame could not be transmitted
    #[error("Transport error: {0}")]
    Transport(String),

    /// An operation required a live connection
    #[error("Not connected")]
    NotConnected,
}

/// Result type for upstream operations.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

// =============================================================================
// Event Stream
// =============================================================================

/// One occurrence on the upstream connection, delivered in arrival order.
///
/// `Error` and `Closed` are terminal: at most one of them is emitted per
/// connected session, and nothing follows it.
#[derive(Debug)]
pub enum UpstreamEvent {
    /// The transport handshake completed; the session may be configured
    Connected,

    /// A decoded frame from the upstream API, passed through unmodified
    Frame(Value),

    /// The connection failed mid-session
    Error(UpstreamError),

    /// The upstream side closed the connection
    Closed {
        /// WebSocket close code reported by the upstream side
        code: u16,
        /// Close reason reported by the upstream side
        reason: String,
    },
}

// =============================================================================
// Base Trait
// =============================================================================

/// One streaming session against the upstream conversational API.
///
/// The session configuration (model, voice, persona instructions) is fixed
/// at construction. `connect` returns the event stream for the lifetime of
/// the connection; all other calls are fire-and-forget frame submissions.
#[async_trait]
pub trait UpstreamSession: Send + Sync {
    /// Open the connection.
    ///
    /// Fails with [`UpstreamError::MissingCredential`] when no API key is
    /// configured and [`UpstreamError::ConnectionFailed`] on transport
    /// failure or connect timeout. On success the returned stream yields
    /// [`UpstreamEvent::Connected`] first, then decoded frames.
    async fn connect(&mut self) -> UpstreamResult<mpsc::Receiver<UpstreamEvent>>;

    /// Send the one-time session configuration frame.
    ///
    /// Must be called exactly once, after `Connected` and before any audio.
    async fn send_setup(&mut self) -> UpstreamResult<()>;

    /// Forward one opaque audio chunk as a realtime-input media chunk.
    ///
    /// Silently drops the chunk when the connection is not live.
    async fn send_audio(&mut self, audio: String) -> UpstreamResult<()>;

    /// Tear down the connection.
    ///
    /// Idempotent; safe on a never-connected session.
    async fn disconnect(&mut self);

    /// Whether the connection is currently live.
    fn is_connected(&self) -> bool;
}
