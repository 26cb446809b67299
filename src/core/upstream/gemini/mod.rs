//! Gemini Live API session implementation.
//!
//! Implements [`crate::core::upstream::UpstreamSession`] on top of the
//! BidiGenerateContent WebSocket endpoint.

pub mod client;
pub mod config;
pub mod messages;

pub use client::GeminiLiveClient;
pub use config::GeminiSessionConfig;
