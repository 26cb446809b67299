//! Relay WebSocket message types
//!
//! The client protocol: JSON messages tagged by `type`. Inbound messages
//! drive the session lifecycle; outbound events report it. Audio payloads
//! are opaque text (base64-encoded by the browser client) and are never
//! inspected on the way through.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Incoming Messages (Client -> Server)
// =============================================================================

/// Incoming WebSocket messages from the browser client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    /// Open an upstream Gemini Live session
    #[serde(rename = "start_session")]
    StartSession,

    /// One opaque audio chunk to forward upstream
    #[serde(rename = "audio_data")]
    AudioData {
        /// Audio payload, base64-encoded by the client
        #[serde(rename = "audioData")]
        audio_data: String,
    },

    /// Close the upstream session, keeping the client connection open
    #[serde(rename = "end_session")]
    EndSession,
}

// =============================================================================
// Outgoing Events (Server -> Client)
// =============================================================================

/// Outgoing WebSocket events to the browser client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutboundEvent {
    /// The upstream session is connected and configured
    #[serde(rename = "session_started")]
    SessionStarted,

    /// One decoded upstream frame, passed through unmodified
    #[serde(rename = "gemini_response")]
    GeminiResponse {
        /// Opaque upstream frame payload
        data: Value,
    },

    /// The upstream side closed the session
    #[serde(rename = "gemini_disconnected")]
    GeminiDisconnected {
        /// WebSocket close code from upstream
        code: u16,
        /// Close reason from upstream
        reason: String,
    },

    /// Something went wrong; the message is generic by design of the
    /// protocol (upstream details stay in server logs)
    #[serde(rename = "error")]
    Error {
        /// Human-readable error description
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_start_session_deserialization() {
        let msg: InboundMessage =
            serde_json::from_str(r#"{"type": "start_session"}"#).expect("Should deserialize");
        assert!(matches!(msg, InboundMessage::StartSession));
    }

    #[test]
    fn test_audio_data_deserialization() {
        let msg: InboundMessage =
            serde_json::from_str(r#"{"type": "audio_data", "audioData": "QUJD"}"#)
                .expect("Should deserialize");
        match msg {
            InboundMessage::AudioData { audio_data } => assert_eq!(audio_data, "QUJD"),
            _ => panic!("Expected AudioData variant"),
        }
    }

    #[test]
    fn test_end_session_deserialization() {
        let msg: InboundMessage =
            serde_json::from_str(r#"{"type": "end_session"}"#).expect("Should deserialize");
        assert!(matches!(msg, InboundMessage::EndSession));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let result = serde_json::from_str::<InboundMessage>(r#"{"type": "bogus"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_type_rejected() {
        let result = serde_json::from_str::<InboundMessage>(r#"{"audioData": "QUJD"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_session_started_serialization() {
        let json = serde_json::to_string(&OutboundEvent::SessionStarted).expect("Should serialize");
        assert_eq!(json, r#"{"type":"session_started"}"#);
    }

    #[test]
    fn test_gemini_response_passes_payload_through() {
        let payload = json!({"serverContent": {"modelTurn": {"parts": [{"text": "hi"}]}}});
        let event = OutboundEvent::GeminiResponse {
            data: payload.clone(),
        };

        let json: Value = serde_json::to_value(&event).expect("Should serialize");
        assert_eq!(json["type"], "gemini_response");
        assert_eq!(json["data"], payload);
    }

    #[test]
    fn test_gemini_disconnected_serialization() {
        let event = OutboundEvent::GeminiDisconnected {
            code: 1000,
            reason: "normal closure".to_string(),
        };

        let json = serde_json::to_string(&event).expect("Should serialize");
        assert!(json.contains(r#""type":"gemini_disconnected""#));
        assert!(json.contains(r#""code":1000"#));
        assert!(json.contains(r#""reason":"normal closure""#));
    }

    #[test]
    fn test_error_serialization() {
        let event = OutboundEvent::Error {
            message: "Connection error with AI service".to_string(),
        };

        let json = serde_json::to_string(&event).expect("Should serialize");
        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains("AI service"));
    }
}
