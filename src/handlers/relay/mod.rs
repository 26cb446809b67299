//! Relay WebSocket handler
//!
//! The client-facing side of the gateway: accepts browser WebSocket
//! connections, routes their messages into a per-connection relay session,
//! and streams Gemini Live responses back.

pub mod handler;
pub mod messages;
pub mod session;

pub use handler::relay_handler;
pub use messages::{InboundMessage, OutboundEvent};
pub use session::{RelaySession, SessionState};
