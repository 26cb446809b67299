//! Gemini Live session configuration.
//!
//! Everything a session sends in its setup frame is fixed here at
//! construction time: model, output voice, and the persona instruction
//! text. The persona is static configuration data, not logic; it defines
//! Rev, the Revolt Motors voice assistant.

use std::time::Duration;

use crate::config::ServerConfig;

/// Gemini Live BidiGenerateContent WebSocket endpoint.
pub const GEMINI_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContent";

/// Default model for live sessions.
pub const DEFAULT_MODEL: &str = "models/gemini-2.0-flash-live-001";

/// Default prebuilt voice for audio responses.
pub const DEFAULT_VOICE: &str = "Aoede";

/// Requested response modality.
pub const RESPONSE_MODALITY_AUDIO: &str = "AUDIO";

/// MIME type attached to every forwarded audio chunk.
pub const AUDIO_INPUT_MIME_TYPE: &str = "audio/pcm";

/// Upper bound on the connect handshake; a hung connect surfaces as a
/// connection failure instead of waiting indefinitely.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// System instruction establishing the assistant persona and topical
/// constraints.
pub const SYSTEM_INSTRUCTION: &str = "\
You are Rev, the voice assistant for Revolt Motors. Revolt Motors is India's #1 electric motorcycle company.

Key information about Revolt Motors:
- Leading electric motorcycle manufacturer in India
- Offers premium electric bikes with impressive range and performance
- Focus on eco-friendly transportation solutions
- Models include RV400 and RV300 series
- Features like swappable batteries, mobile app connectivity
- Available across major Indian cities

Your personality:
- Enthusiastic about electric vehicles and sustainability
- Knowledgeable about Revolt Motors products
- Professional yet friendly tone
- Quick and concise responses
- Always redirect conversations back to Revolt Motors when appropriate

Guidelines:
- Only discuss topics related to Revolt Motors, electric vehicles, or sustainable transportation
- If asked about unrelated topics, politely redirect to Revolt Motors
- Provide accurate information about products, features, and availability
- Encourage potential customers to book test rides or visit showrooms
- Keep responses conversational and under 30 seconds when spoken";

/// Immutable configuration for one upstream session.
#[derive(Debug, Clone)]
pub struct GeminiSessionConfig {
    /// API key; absence fails the session at connect time
    pub api_key: Option<String>,

    /// WebSocket endpoint (overridable for testing)
    pub endpoint: String,

    /// Model identifier sent in the setup frame
    pub model: String,

    /// Prebuilt voice name sent in the setup frame
    pub voice: String,

    /// System instruction text sent in the setup frame
    pub system_instruction: String,
}

impl Default for GeminiSessionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: GEMINI_LIVE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
        }
    }
}

impl GeminiSessionConfig {
    /// Build a session configuration from the server configuration,
    /// applying defaults for anything unset.
    pub fn from_server_config(config: &ServerConfig) -> Self {
        Self {
            api_key: config.gemini_api_key.clone(),
            endpoint: config
                .gemini_live_url
                .clone()
                .unwrap_or_else(|| GEMINI_LIVE_URL.to_string()),
            model: config
                .gemini_model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            voice: config
                .gemini_voice
                .clone()
                .unwrap_or_else(|| DEFAULT_VOICE.to_string()),
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
        }
    }
}
