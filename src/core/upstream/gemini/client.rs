//! Gemini Live API client implementation.
//!
//! Wraps one WebSocket connection to the BidiGenerateContent endpoint.
//! `connect` performs the handshake, then hands the reader/writer loop to a
//! spawned task; the owner consumes the session through the returned
//! [`UpstreamEvent`] stream and submits frames through the struct methods.
//!
//! # Protocol
//!
//! - Endpoint: `wss://generativelanguage.googleapis.com/ws/...BidiGenerateContent?key=<API_KEY>`
//! - Outbound: one setup frame, then realtime-input frames (JSON text)
//! - Inbound: opaque JSON frames, forwarded undecoded beyond parsing

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::config::{AUDIO_INPUT_MIME_TYPE, CONNECT_TIMEOUT, GeminiSessionConfig};
use super::messages::{OutgoingFrame, RealtimeInputFrame, SetupFrame};
use crate::core::upstream::base::{UpstreamError, UpstreamEvent, UpstreamResult, UpstreamSession};

/// Channel capacity for decoded upstream events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Channel capacity for outgoing frames.
const FRAME_CHANNEL_CAPACITY: usize = 256;

/// Close code reported when the connection ends without a close handshake.
const ABNORMAL_CLOSE_CODE: u16 = 1006;

/// Gemini Live API session client.
///
/// The session configuration is immutable for the client's lifetime. The
/// `connected` flag is shared with the spawned connection task so status
/// checks stay lock-free.
pub struct GeminiLiveClient {
    /// Immutable session configuration
    config: GeminiSessionConfig,
    /// Connected flag, shared with the connection task
    connected: Arc<AtomicBool>,
    /// Outgoing frame channel (present while connected)
    frame_tx: Option<mpsc::Sender<OutgoingFrame>>,
    /// Connection task handle
    task: Option<JoinHandle<()>>,
}

impl GeminiLiveClient {
    /// Create a client for one upstream session.
    pub fn new(config: GeminiSessionConfig) -> Self {
        Self {
            config,
            connected: Arc::new(AtomicBool::new(false)),
            frame_tx: None,
            task: None,
        }
    }

    /// Build the WebSocket URL with the key query parameter.
    fn build_ws_url(&self, api_key: &str) -> String {
        format!("{}?key={}", self.config.endpoint, api_key)
    }

    /// Queue a frame for transmission.
    async fn send_frame(&self, frame: OutgoingFrame) -> UpstreamResult<()> {
        match self.frame_tx.as_ref() {
            Some(tx) => tx
                .send(frame)
                .await
                .map_err(|e| UpstreamError::Transport(e.to_string())),
            None => Err(UpstreamError::NotConnected),
        }
    }
}

/// Decode one inbound WebSocket payload as a JSON frame.
///
/// Unparseable frames are logged and dropped; the session continues.
fn decode_frame(raw: &[u8]) -> Option<serde_json::Value> {
    match serde_json::from_slice(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Failed to parse Gemini frame: {e}");
            None
        }
    }
}

#[async_trait]
impl UpstreamSession for GeminiLiveClient {
    async fn connect(&mut self) -> UpstreamResult<mpsc::Receiver<UpstreamEvent>> {
        let api_key = match self.config.api_key.as_deref() {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => return Err(UpstreamError::MissingCredential),
        };

        let url = self.build_ws_url(&api_key);
        let connect = tokio_tungstenite::connect_async(url);
        let (ws_stream, _response) = tokio::time::timeout(CONNECT_TIMEOUT, connect)
            .await
            .map_err(|_| {
                UpstreamError::ConnectionFailed(format!(
                    "connect timed out after {}s",
                    CONNECT_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|e| UpstreamError::ConnectionFailed(e.to_string()))?;

        info!("Connected to Gemini Live API");

        let (mut ws_sink, mut ws_source) = ws_stream.split();
        let (event_tx, event_rx) = mpsc::channel::<UpstreamEvent>(EVENT_CHANNEL_CAPACITY);
        let (frame_tx, mut frame_rx) = mpsc::channel::<OutgoingFrame>(FRAME_CHANNEL_CAPACITY);

        self.frame_tx = Some(frame_tx);
        self.connected.store(true, Ordering::SeqCst);
        let connected = self.connected.clone();

        let handle = tokio::spawn(async move {
            // Readiness is reported through the same stream as every other
            // occurrence, so the owner sees the session in arrival order.
            if event_tx.send(UpstreamEvent::Connected).await.is_err() {
                connected.store(false, Ordering::SeqCst);
                return;
            }

            loop {
                tokio::select! {
                    // Outgoing frames
                    Some(frame) = frame_rx.recv() => {
                        let json = match serde_json::to_string(&frame) {
                            Ok(json) => json,
                            Err(e) => {
                                error!("Failed to serialize outgoing frame: {e}");
                                continue;
                            }
                        };
                        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                            error!("Failed to send frame to Gemini: {e}");
                            let _ = event_tx
                                .send(UpstreamEvent::Error(UpstreamError::Transport(
                                    e.to_string(),
                                )))
                                .await;
                            break;
                        }
                    }

                    // Incoming frames
                    msg = ws_source.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                if let Some(value) = decode_frame(text.as_bytes()) {
                                    if event_tx.send(UpstreamEvent::Frame(value)).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            Some(Ok(Message::Binary(data))) => {
                                if let Some(value) = decode_frame(&data) {
                                    if event_tx.send(UpstreamEvent::Frame(value)).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            Some(Ok(Message::Ping(data))) => {
                                if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                    error!("Failed to send pong to Gemini: {e}");
                                }
                            }
                            Some(Ok(Message::Close(frame))) => {
                                let (code, reason) = match frame {
                                    Some(frame) => {
                                        (u16::from(frame.code), frame.reason.to_string())
                                    }
                                    None => (ABNORMAL_CLOSE_CODE, String::new()),
                                };
                                info!(code, "Gemini WebSocket closed: {reason}");
                                let _ = event_tx
                                    .send(UpstreamEvent::Closed { code, reason })
                                    .await;
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                error!("Gemini WebSocket error: {e}");
                                let _ = event_tx
                                    .send(UpstreamEvent::Error(UpstreamError::Transport(
                                        e.to_string(),
                                    )))
                                    .await;
                                break;
                            }
                            None => {
                                let _ = event_tx
                                    .send(UpstreamEvent::Closed {
                                        code: ABNORMAL_CLOSE_CODE,
                                        reason: "connection closed abruptly".to_string(),
                                    })
                                    .await;
                                break;
                            }
                        }
                    }
                }
            }

            connected.store(false, Ordering::SeqCst);
            debug!("Gemini connection task ended");
        });

        self.task = Some(handle);
        Ok(event_rx)
    }

    async fn send_setup(&mut self) -> UpstreamResult<()> {
        let frame = OutgoingFrame::Setup(SetupFrame::new(&self.config));
        self.send_frame(frame).await
    }

    async fn send_audio(&mut self, audio: String) -> UpstreamResult<()> {
        if !self.is_connected() {
            debug!("Not connected to Gemini, dropping audio chunk");
            return Ok(());
        }

        let frame = OutgoingFrame::RealtimeInput(RealtimeInputFrame::media_chunk(
            AUDIO_INPUT_MIME_TYPE,
            audio,
        ));
        self.send_frame(frame).await
    }

    async fn disconnect(&mut self) {
        self.frame_tx = None;

        if let Some(handle) = self.task.take() {
            handle.abort();
        }

        if self.connected.swap(false, Ordering::SeqCst) {
            info!("Disconnected from Gemini Live API");
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
