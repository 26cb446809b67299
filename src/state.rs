//! Shared application state
//!
//! One instance is created at startup and handed to every handler through
//! axum's `State` extractor. Besides the immutable configuration it owns the
//! [`ConnectionRegistry`], the only state shared across connection tasks.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::registry::ConnectionRegistry;

/// Application state shared by all handlers.
pub struct AppState {
    /// Server configuration (immutable after startup)
    pub config: ServerConfig,

    /// Registry of live client connections
    pub registry: ConnectionRegistry,
}

impl AppState {
    /// Build the shared state from a loaded configuration.
    pub fn new(config: ServerConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            registry: ConnectionRegistry::new(),
        })
    }
}
