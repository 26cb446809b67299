//! Connection registry
//!
//! Tracks every connected browser client by an opaque identifier, mapping it
//! to the outbound handle used to deliver events to that client. The
//! registry is owned by [`crate::state::AppState`], constructed at startup
//! and torn down with the process; entries are inserted when a WebSocket
//! connection is accepted and removed when it closes, including abnormal
//! disconnects.
//!
//! Each client's entry is independent, so the map only needs per-key
//! exclusion; `DashMap` provides sharded locking with no cross-key
//! coordination.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::handlers::relay::OutboundEvent;

/// Opaque identifier for a connected client, generated at accept time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outbound transport handle for one connected client.
///
/// Events sent here are serialized and written to the client's WebSocket by
/// that connection's writer task. Cloning is cheap; the underlying channel
/// closes when the connection's writer task exits.
#[derive(Clone)]
pub struct ClientConnection {
    sender: mpsc::Sender<OutboundEvent>,
}

impl ClientConnection {
    pub fn new(sender: mpsc::Sender<OutboundEvent>) -> Self {
        Self { sender }
    }

    /// Deliver an event to the client. Errors (client already gone) are
    /// swallowed: a disconnected client has nothing left to be told.
    pub async fn send(&self, event: OutboundEvent) {
        let _ = self.sender.send(event).await;
    }

    /// Whether the client's writer task is still accepting events.
    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }
}

/// Process-wide map from [`ClientId`] to its [`ClientConnection`].
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ClientId, ClientConnection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register a newly accepted client connection.
    pub fn register(&self, id: ClientId, connection: ClientConnection) {
        self.connections.insert(id, connection);
    }

    /// Look up the outbound handle for a client, if still connected.
    pub fn lookup(&self, id: &ClientId) -> Option<ClientConnection> {
        self.connections.get(id).map(|entry| entry.value().clone())
    }

    /// Remove a client's entry. Safe to call for an id that was already
    /// removed.
    pub fn remove(&self, id: &ClientId) {
        self.connections.remove(id);
    }

    /// Number of currently registered clients.
    pub fn active_count(&self) -> usize {
        self.connections.len()
    }
}

/// Shared registry handle.
pub type SharedRegistry = Arc<ConnectionRegistry>;
