//! Relay WebSocket handler
//!
//! Accepts a browser WebSocket connection, registers it, and runs the
//! per-connection event loop: client frames and upstream events are
//! interleaved through one `select!` and fed into the relay session, so all
//! state transitions for a connection happen on its own task. A writer task
//! drains the outbound event channel onto the socket.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::messages::{InboundMessage, OutboundEvent};
use super::session::{RelaySession, SessionState};
use crate::core::upstream::{GeminiLiveClient, GeminiSessionConfig, UpstreamEvent};
use crate::registry::{ClientConnection, ClientId};
use crate::state::AppState;

/// Outbound event channel capacity per connection.
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Message sent when an inbound client message cannot be handled.
const CLIENT_ERROR_MESSAGE: &str = "Server error processing request";

/// Relay WebSocket handler
///
/// Upgrades the HTTP connection to WebSocket for a relay session against
/// the Gemini Live API.
pub async fn relay_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_relay_socket(socket, state))
}

/// One turn of the connection loop: either the client or the upstream side
/// produced something.
enum ConnectionTurn {
    Client(Option<Result<Message, axum::Error>>),
    Upstream(Option<UpstreamEvent>),
}

/// Run one client connection to completion.
async fn handle_relay_socket(socket: WebSocket, state: Arc<AppState>) {
    let client_id = ClientId::new();
    info!(client_id = %client_id, "Client connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundEvent>(CHANNEL_BUFFER_SIZE);
    let connection = ClientConnection::new(outbound_tx);
    state
        .registry
        .register(client_id.clone(), connection.clone());

    // Writer task: serializes outbound events onto the client socket.
    let sender_task = tokio::spawn(async move {
        while let Some(event) = outbound_rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize outbound event: {e}");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut session = RelaySession::new(client_id.clone(), connection.clone());
    let mut upstream_rx: Option<mpsc::Receiver<UpstreamEvent>> = None;

    loop {
        let turn = tokio::select! {
            msg = ws_receiver.next() => ConnectionTurn::Client(msg),
            event = next_upstream_event(&mut upstream_rx) => ConnectionTurn::Upstream(event),
        };

        match turn {
            ConnectionTurn::Client(Some(Ok(msg))) => {
                let keep_going =
                    process_client_message(msg, &mut session, &mut upstream_rx, &connection, &state)
                        .await;
                if !keep_going {
                    break;
                }
            }
            ConnectionTurn::Client(Some(Err(e))) => {
                warn!(client_id = %client_id, "Client WebSocket error: {e}");
                break;
            }
            ConnectionTurn::Client(None) => {
                info!(client_id = %client_id, "Client disconnected");
                break;
            }
            ConnectionTurn::Upstream(Some(event)) => {
                if session.handle_upstream_event(event).await {
                    upstream_rx = None;
                }
            }
            ConnectionTurn::Upstream(None) => {
                // Upstream task ended and the stream drained; nothing more
                // will arrive on this receiver.
                upstream_rx = None;
            }
        }
    }

    // Cleanup: the upstream session must not outlive the client connection.
    state.registry.remove(&client_id);
    session.shutdown().await;
    sender_task.abort();
    info!(client_id = %client_id, "Relay connection terminated");
}

/// Await the next upstream event, or park forever when no upstream session
/// is live.
async fn next_upstream_event(
    rx: &mut Option<mpsc::Receiver<UpstreamEvent>>,
) -> Option<UpstreamEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Process one inbound WebSocket message. Returns `false` when the
/// connection should close.
async fn process_client_message(
    msg: Message,
    session: &mut RelaySession,
    upstream_rx: &mut Option<mpsc::Receiver<UpstreamEvent>>,
    connection: &ClientConnection,
    state: &Arc<AppState>,
) -> bool {
    match msg {
        Message::Text(text) => {
            dispatch_inbound(text.as_bytes(), session, upstream_rx, connection, state).await;
            true
        }
        Message::Binary(data) => {
            // The client protocol is JSON even when framed as binary.
            dispatch_inbound(&data, session, upstream_rx, connection, state).await;
            true
        }
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            debug!(client_id = %session.client_id(), "Client close frame received");
            false
        }
    }
}

/// Parse and dispatch one inbound client message.
///
/// Malformed messages (bad JSON, missing or unknown `type`) produce a typed
/// `error` event and leave the connection and session untouched.
async fn dispatch_inbound(
    raw: &[u8],
    session: &mut RelaySession,
    upstream_rx: &mut Option<mpsc::Receiver<UpstreamEvent>>,
    connection: &ClientConnection,
    state: &Arc<AppState>,
) {
    let msg: InboundMessage = match serde_json::from_slice(raw) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(client_id = %session.client_id(), "Failed to parse client message: {e}");
            connection
                .send(OutboundEvent::Error {
                    message: CLIENT_ERROR_MESSAGE.to_string(),
                })
                .await;
            return;
        }
    };

    match msg {
        InboundMessage::StartSession => {
            match session.state() {
                SessionState::Connecting | SessionState::Active => {
                    debug!(
                        client_id = %session.client_id(),
                        "start_session ignored: session already in progress"
                    );
                }
                current => {
                    // A closed session object is never reused.
                    if current == SessionState::Closed {
                        *session =
                            RelaySession::new(session.client_id().clone(), connection.clone());
                    }

                    let config = GeminiSessionConfig::from_server_config(&state.config);
                    let upstream = GeminiLiveClient::new(config);
                    if let Some(events) = session.start(Box::new(upstream)).await {
                        *upstream_rx = Some(events);
                    }
                }
            }
        }
        InboundMessage::AudioData { audio_data } => {
            session.forward_audio(audio_data).await;
        }
        InboundMessage::EndSession => {
            session.end().await;
            // The upstream task is gone; drop whatever the stream buffered.
            *upstream_rx = None;
        }
    }
}
