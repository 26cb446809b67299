pub mod config;
pub mod core;
pub mod handlers;
pub mod registry;
pub mod routes;
pub mod state;

// Re-export commonly used items for convenience
pub use crate::config::ServerConfig;
pub use crate::core::*;
pub use crate::registry::{ClientConnection, ClientId, ConnectionRegistry};
pub use crate::state::AppState;
