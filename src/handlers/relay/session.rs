//! Per-client relay session state machine.
//!
//! One [`RelaySession`] coordinates one browser client with at most one
//! upstream Gemini Live session. The connection task feeds it client
//! requests and upstream events one at a time, so every transition is
//! serialized; the session itself is a plain state value with no interior
//! locking.
//!
//! State machine: `Idle -> Connecting -> Active -> Closed`, with a direct
//! jump to `Closed` from any state on failure or explicit end. `Closed` is
//! terminal for the object; a later `start_session` gets a brand-new
//! session value.

use std::fmt;

use tracing::{debug, error, info, warn};

use super::messages::OutboundEvent;
use crate::core::upstream::{UpstreamEvent, UpstreamSession};
use crate::registry::{ClientConnection, ClientId};

/// Message shown to clients when the upstream session fails. Deliberately
/// generic: upstream error details stay in the server logs.
pub const UPSTREAM_ERROR_MESSAGE: &str = "Connection error with AI service";

/// Lifecycle state of a relay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No upstream session exists
    #[default]
    Idle,
    /// Upstream connect in progress
    Connecting,
    /// Upstream session live; audio flows
    Active,
    /// Terminal; the session object is never reused
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Connecting => write!(f, "Connecting"),
            SessionState::Active => write!(f, "Active"),
            SessionState::Closed => write!(f, "Closed"),
        }
    }
}

/// Per-client session coordinating the client connection with its upstream
/// Gemini Live session.
pub struct RelaySession {
    client_id: ClientId,
    state: SessionState,
    upstream: Option<Box<dyn UpstreamSession>>,
    outbound: ClientConnection,
}

impl RelaySession {
    /// Create a fresh session in `Idle`.
    pub fn new(client_id: ClientId, outbound: ClientConnection) -> Self {
        Self {
            client_id,
            state: SessionState::Idle,
            upstream: None,
            outbound,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Open an upstream session.
    ///
    /// Valid only from `Idle`; anywhere else the request is an idempotent
    /// no-op (at most one upstream session per client). Returns the
    /// upstream event stream when the connect succeeded; on failure the
    /// client has already been sent a generic `error` and the session is
    /// `Closed`.
    pub async fn start(
        &mut self,
        mut upstream: Box<dyn UpstreamSession>,
    ) -> Option<tokio::sync::mpsc::Receiver<UpstreamEvent>> {
        if self.state != SessionState::Idle {
            debug!(
                client_id = %self.client_id,
                state = %self.state,
                "start_session ignored: upstream session already requested"
            );
            return None;
        }

        self.state = SessionState::Connecting;
        info!(client_id = %self.client_id, "Opening Gemini Live session");

        match upstream.connect().await {
            Ok(events) => {
                self.upstream = Some(upstream);
                Some(events)
            }
            Err(e) => {
                error!(client_id = %self.client_id, "Failed to connect to Gemini: {e}");
                self.outbound
                    .send(OutboundEvent::Error {
                        message: UPSTREAM_ERROR_MESSAGE.to_string(),
                    })
                    .await;
                self.state = SessionState::Closed;
                None
            }
        }
    }

    /// Forward one opaque audio chunk upstream.
    ///
    /// Dropped silently unless the session is `Active`: audio sent before
    /// the session is ready (or after it ended) produces no client event.
    pub async fn forward_audio(&mut self, audio: String) {
        if self.state != SessionState::Active {
            debug!(
                client_id = %self.client_id,
                state = %self.state,
                "Dropping audio chunk: session not active"
            );
            return;
        }

        if let Some(upstream) = self.upstream.as_mut()
            && let Err(e) = upstream.send_audio(audio).await
        {
            // The reader side will surface the terminal transport event.
            warn!(client_id = %self.client_id, "Failed to forward audio chunk: {e}");
        }
    }

    /// Apply one upstream event to the state machine.
    ///
    /// Returns `true` when the upstream stream is finished and its receiver
    /// should be dropped.
    pub async fn handle_upstream_event(&mut self, event: UpstreamEvent) -> bool {
        match event {
            UpstreamEvent::Connected => {
                if self.state != SessionState::Connecting {
                    debug!(
                        client_id = %self.client_id,
                        state = %self.state,
                        "Ignoring connected event"
                    );
                    return false;
                }

                // The session is configured before the client is told it is
                // live, so no audio can beat the setup frame upstream.
                if let Some(upstream) = self.upstream.as_mut()
                    && let Err(e) = upstream.send_setup().await
                {
                    error!(client_id = %self.client_id, "Failed to send session setup: {e}");
                    self.fail().await;
                    return true;
                }

                self.state = SessionState::Active;
                self.outbound.send(OutboundEvent::SessionStarted).await;
                info!(client_id = %self.client_id, "Gemini Live session active");
                false
            }

            UpstreamEvent::Frame(data) => {
                if self.state == SessionState::Active {
                    self.outbound
                        .send(OutboundEvent::GeminiResponse { data })
                        .await;
                } else {
                    debug!(
                        client_id = %self.client_id,
                        state = %self.state,
                        "Dropping upstream frame: session not active"
                    );
                }
                false
            }

            UpstreamEvent::Error(e) => {
                if self.state == SessionState::Closed {
                    // Termination already reported; stay silent.
                    return true;
                }
                error!(client_id = %self.client_id, "Gemini transport error: {e}");
                self.fail().await;
                true
            }

            UpstreamEvent::Closed { code, reason } => {
                if self.state == SessionState::Closed {
                    return true;
                }
                info!(client_id = %self.client_id, code, "Gemini session closed: {reason}");
                self.outbound
                    .send(OutboundEvent::GeminiDisconnected { code, reason })
                    .await;
                self.release().await;
                true
            }
        }
    }

    /// Handle an explicit `end_session` request.
    ///
    /// Closes the upstream session if one exists; otherwise a no-op.
    pub async fn end(&mut self) {
        if self.upstream.is_some() {
            info!(client_id = %self.client_id, "Ending Gemini Live session");
            self.release().await;
        } else {
            debug!(client_id = %self.client_id, "end_session ignored: no upstream session");
        }
    }

    /// Tear down on client disconnect.
    ///
    /// Ensures the upstream session never outlives its client connection.
    pub async fn shutdown(&mut self) {
        if self.upstream.is_some() {
            self.release().await;
        }
    }

    /// Report a failure to the client and close.
    async fn fail(&mut self) {
        self.outbound
            .send(OutboundEvent::Error {
                message: UPSTREAM_ERROR_MESSAGE.to_string(),
            })
            .await;
        self.release().await;
    }

    /// Disconnect and drop the upstream session; terminal.
    async fn release(&mut self) {
        if let Some(mut upstream) = self.upstream.take() {
            upstream.disconnect().await;
        }
        self.state = SessionState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::upstream::{UpstreamError, UpstreamResult};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use tokio::sync::mpsc;
    use tokio::sync::mpsc::error::TryRecvError;

    /// Shared view into a mock upstream session, for assertions and for
    /// simulating upstream events after connect.
    #[derive(Clone, Default)]
    struct MockHandle {
        connected: Arc<AtomicBool>,
        setup_count: Arc<AtomicU32>,
        audio: Arc<Mutex<Vec<String>>>,
        disconnect_count: Arc<AtomicU32>,
        events_tx: Arc<Mutex<Option<mpsc::Sender<UpstreamEvent>>>>,
    }

    impl MockHandle {
        fn setup_frames(&self) -> u32 {
            self.setup_count.load(Ordering::SeqCst)
        }

        fn disconnects(&self) -> u32 {
            self.disconnect_count.load(Ordering::SeqCst)
        }

        fn recorded_audio(&self) -> Vec<String> {
            self.audio.lock().unwrap().clone()
        }

        async fn emit(&self, event: UpstreamEvent) {
            let tx = self
                .events_tx
                .lock()
                .unwrap()
                .clone()
                .expect("mock not connected");
            tx.send(event).await.expect("session dropped event stream");
        }
    }

    struct MockUpstream {
        handle: MockHandle,
        fail_connect: Option<UpstreamError>,
    }

    impl MockUpstream {
        fn new() -> (Self, MockHandle) {
            let handle = MockHandle::default();
            (
                Self {
                    handle: handle.clone(),
                    fail_connect: None,
                },
                handle,
            )
        }

        fn failing(error: UpstreamError) -> (Self, MockHandle) {
            let (mut mock, handle) = Self::new();
            mock.fail_connect = Some(error);
            (mock, handle)
        }
    }

    #[async_trait]
    impl UpstreamSession for MockUpstream {
        async fn connect(&mut self) -> UpstreamResult<mpsc::Receiver<UpstreamEvent>> {
            if let Some(error) = self.fail_connect.take() {
                return Err(error);
            }
            let (tx, rx) = mpsc::channel(16);
            *self.handle.events_tx.lock().unwrap() = Some(tx);
            self.handle.connected.store(true, Ordering::SeqCst);
            Ok(rx)
        }

        async fn send_setup(&mut self) -> UpstreamResult<()> {
            self.handle.setup_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn send_audio(&mut self, audio: String) -> UpstreamResult<()> {
            if !self.is_connected() {
                return Ok(());
            }
            self.handle.audio.lock().unwrap().push(audio);
            Ok(())
        }

        async fn disconnect(&mut self) {
            self.handle.disconnect_count.fetch_add(1, Ordering::SeqCst);
            self.handle.connected.store(false, Ordering::SeqCst);
        }

        fn is_connected(&self) -> bool {
            self.handle.connected.load(Ordering::SeqCst)
        }
    }

    fn session() -> (RelaySession, mpsc::Receiver<OutboundEvent>) {
        let (tx, rx) = mpsc::channel(32);
        let session = RelaySession::new(ClientId::new(), ClientConnection::new(tx));
        (session, rx)
    }

    /// Pump one upstream event through the session.
    async fn pump(session: &mut RelaySession, events: &mut mpsc::Receiver<UpstreamEvent>) -> bool {
        let event = events.recv().await.expect("expected upstream event");
        session.handle_upstream_event(event).await
    }

    #[tokio::test]
    async fn test_audio_before_start_is_dropped_silently() {
        let (mut session, mut outbound) = session();

        session.forward_audio("QUJD".to_string()).await;

        assert_eq!(session.state(), SessionState::Idle);
        assert!(matches!(outbound.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_start_then_connected_activates_session() {
        let (mut session, mut outbound) = session();
        let (mock, handle) = MockUpstream::new();

        let mut events = session
            .start(Box::new(mock))
            .await
            .expect("connect should succeed");
        assert_eq!(session.state(), SessionState::Connecting);
        assert_eq!(handle.setup_frames(), 0);

        handle.emit(UpstreamEvent::Connected).await;
        let finished = pump(&mut session, &mut events).await;

        assert!(!finished);
        assert_eq!(session.state(), SessionState::Active);
        // Exactly one setup frame, sent before the client heard anything.
        assert_eq!(handle.setup_frames(), 1);
        assert_eq!(outbound.recv().await, Some(OutboundEvent::SessionStarted));
        assert!(matches!(outbound.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_audio_while_connecting_is_dropped() {
        let (mut session, _outbound) = session();
        let (mock, handle) = MockUpstream::new();

        let _events = session.start(Box::new(mock)).await.unwrap();
        session.forward_audio("QUJD".to_string()).await;

        assert!(handle.recorded_audio().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_start_is_idempotent_noop() {
        let (mut session, mut outbound) = session();
        let (mock, handle) = MockUpstream::new();
        let (second_mock, second_handle) = MockUpstream::new();

        let _events = session.start(Box::new(mock)).await.unwrap();
        assert!(session.start(Box::new(second_mock)).await.is_none());

        assert_eq!(session.state(), SessionState::Connecting);
        assert_eq!(handle.disconnects(), 0);
        assert_eq!(second_handle.setup_frames(), 0);
        assert!(matches!(outbound.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_response_frame_passes_through_unmodified() {
        let (mut session, mut outbound) = session();
        let (mock, handle) = MockUpstream::new();

        let mut events = session.start(Box::new(mock)).await.unwrap();
        handle.emit(UpstreamEvent::Connected).await;
        pump(&mut session, &mut events).await;
        outbound.recv().await; // session_started

        let payload = json!({"serverContent": {"modelTurn": {"parts": [{"inlineData": {"data": "AAAA"}}]}}});
        handle.emit(UpstreamEvent::Frame(payload.clone())).await;
        pump(&mut session, &mut events).await;

        assert_eq!(
            outbound.recv().await,
            Some(OutboundEvent::GeminiResponse { data: payload })
        );
    }

    #[tokio::test]
    async fn test_full_session_scenario() {
        let (mut session, mut outbound) = session();
        let (mock, handle) = MockUpstream::new();

        let mut events = session.start(Box::new(mock)).await.unwrap();
        handle.emit(UpstreamEvent::Connected).await;
        pump(&mut session, &mut events).await;
        assert_eq!(outbound.recv().await, Some(OutboundEvent::SessionStarted));

        session.forward_audio("QUJD".to_string()).await;
        assert_eq!(handle.recorded_audio(), vec!["QUJD".to_string()]);

        session.end().await;
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(handle.disconnects(), 1);
        assert!(matches!(outbound.try_recv(), Err(TryRecvError::Empty)));

        // Audio after the session ended is dropped without effect.
        session.forward_audio("QUJD".to_string()).await;
        assert_eq!(handle.recorded_audio(), vec!["QUJD".to_string()]);
    }

    #[tokio::test]
    async fn test_connect_failure_reports_generic_error() {
        let (mut session, mut outbound) = session();
        let (mock, handle) = MockUpstream::failing(UpstreamError::MissingCredential);

        let events = session.start(Box::new(mock)).await;

        assert!(events.is_none());
        assert_eq!(session.state(), SessionState::Closed);
        // No setup frame was ever sent.
        assert_eq!(handle.setup_frames(), 0);
        match outbound.recv().await {
            Some(OutboundEvent::Error { message }) => {
                assert!(!message.is_empty());
                // Upstream internals are not leaked to the client.
                assert!(!message.contains("API key"));
            }
            other => panic!("Expected error event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_upstream_error_terminates_once() {
        let (mut session, mut outbound) = session();
        let (mock, handle) = MockUpstream::new();

        let mut events = session.start(Box::new(mock)).await.unwrap();
        handle.emit(UpstreamEvent::Connected).await;
        pump(&mut session, &mut events).await;
        outbound.recv().await; // session_started

        let finished = session
            .handle_upstream_event(UpstreamEvent::Error(UpstreamError::Transport(
                "reset".to_string(),
            )))
            .await;
        assert!(finished);
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(handle.disconnects(), 1);
        assert_eq!(
            outbound.recv().await,
            Some(OutboundEvent::Error {
                message: UPSTREAM_ERROR_MESSAGE.to_string()
            })
        );

        // A second terminal event must not produce a second client event.
        let finished = session
            .handle_upstream_event(UpstreamEvent::Error(UpstreamError::Transport(
                "reset again".to_string(),
            )))
            .await;
        assert!(finished);
        assert!(matches!(outbound.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_remote_close_reports_code_and_reason() {
        let (mut session, mut outbound) = session();
        let (mock, handle) = MockUpstream::new();

        let mut events = session.start(Box::new(mock)).await.unwrap();
        handle.emit(UpstreamEvent::Connected).await;
        pump(&mut session, &mut events).await;
        outbound.recv().await; // session_started

        let finished = session
            .handle_upstream_event(UpstreamEvent::Closed {
                code: 1011,
                reason: "server going away".to_string(),
            })
            .await;

        assert!(finished);
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(
            outbound.recv().await,
            Some(OutboundEvent::GeminiDisconnected {
                code: 1011,
                reason: "server going away".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_shutdown_disconnects_exactly_once() {
        let (mut session, mut outbound) = session();
        let (mock, handle) = MockUpstream::new();

        let mut events = session.start(Box::new(mock)).await.unwrap();
        handle.emit(UpstreamEvent::Connected).await;
        pump(&mut session, &mut events).await;
        outbound.recv().await; // session_started

        session.shutdown().await;
        assert_eq!(handle.disconnects(), 1);
        assert_eq!(session.state(), SessionState::Closed);

        // Shutdown is safe to repeat.
        session.shutdown().await;
        assert_eq!(handle.disconnects(), 1);
    }

    #[tokio::test]
    async fn test_end_without_session_is_noop() {
        let (mut session, mut outbound) = session();

        session.end().await;

        assert_eq!(session.state(), SessionState::Idle);
        assert!(matches!(outbound.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_frame_while_connecting_is_dropped() {
        let (mut session, mut outbound) = session();
        let (mock, handle) = MockUpstream::new();

        let mut events = session.start(Box::new(mock)).await.unwrap();
        handle
            .emit(UpstreamEvent::Frame(json!({"setupComplete": {}})))
            .await;
        let finished = pump(&mut session, &mut events).await;

        assert!(!finished);
        assert_eq!(session.state(), SessionState::Connecting);
        assert!(matches!(outbound.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_closed_session_is_never_restarted() {
        let (mut session, _outbound) = session();
        let (mock, handle) = MockUpstream::new();

        let _events = session.start(Box::new(mock)).await.unwrap();
        session.end().await;
        assert_eq!(session.state(), SessionState::Closed);

        let (second_mock, second_handle) = MockUpstream::new();
        assert!(session.start(Box::new(second_mock)).await.is_none());
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(second_handle.setup_frames(), 0);
        assert_eq!(handle.disconnects(), 1);
    }
}
