//! Upstream session layer.
//!
//! Everything that talks to the streaming conversational API lives here:
//! the [`UpstreamSession`] trait consumed by the relay session, the unified
//! [`UpstreamEvent`] stream it produces, and the Gemini Live implementation.

pub mod base;
pub mod gemini;

pub use base::{UpstreamError, UpstreamEvent, UpstreamResult, UpstreamSession};
pub use gemini::{GeminiLiveClient, GeminiSessionConfig};
