//! Gemini Live API wire message types.
//!
//! Outbound frames for the BidiGenerateContent WebSocket protocol. A session
//! sends exactly one setup frame after connecting, then any number of
//! realtime-input frames carrying audio. Inbound frames are opaque JSON and
//! are not modeled here; they pass through to the client unmodified.

use serde::{Deserialize, Serialize};

use super::config::GeminiSessionConfig;

// =============================================================================
// Setup Frame
// =============================================================================

/// One-time session configuration frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupFrame {
    pub setup: Setup,
}

/// Session configuration payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setup {
    /// Model identifier (e.g. "models/gemini-2.0-flash-live-001")
    pub model: String,
    pub generation_config: GenerationConfig,
    pub system_instruction: SystemInstruction,
}

/// Generation options for the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Requested output modalities (audio only for voice sessions)
    pub response_modalities: Vec<String>,
    pub speech_config: SpeechConfig,
}

/// Speech synthesis options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

/// Voice selection wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

/// Prebuilt voice selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

/// System instruction block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInstruction {
    pub parts: Vec<Part>,
}

/// One text part of a system instruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

impl SetupFrame {
    /// Build the setup frame for a session configuration.
    pub fn new(config: &GeminiSessionConfig) -> Self {
        Self {
            setup: Setup {
                model: config.model.clone(),
                generation_config: GenerationConfig {
                    response_modalities: vec![
                        super::config::RESPONSE_MODALITY_AUDIO.to_string(),
                    ],
                    speech_config: SpeechConfig {
                        voice_config: VoiceConfig {
                            prebuilt_voice_config: PrebuiltVoiceConfig {
                                voice_name: config.voice.clone(),
                            },
                        },
                    },
                },
                system_instruction: SystemInstruction {
                    parts: vec![Part {
                        text: config.system_instruction.clone(),
                    }],
                },
            },
        }
    }
}

// =============================================================================
// Realtime Input Frame
// =============================================================================

/// Streaming input frame carrying audio media chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeInputFrame {
    pub realtime_input: RealtimeInput,
}

/// Realtime input payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeInput {
    pub media_chunks: Vec<MediaChunk>,
}

/// One opaque media chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaChunk {
    pub mime_type: String,
    pub data: String,
}

impl RealtimeInputFrame {
    /// Wrap one audio payload as a single media chunk.
    pub fn media_chunk(mime_type: &str, data: String) -> Self {
        Self {
            realtime_input: RealtimeInput {
                media_chunks: vec![MediaChunk {
                    mime_type: mime_type.to_string(),
                    data,
                }],
            },
        }
    }
}

// =============================================================================
// Outgoing Frames
// =============================================================================

/// Any frame the client half of the connection can transmit.
///
/// Untagged: each variant serializes as its own top-level wire shape.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OutgoingFrame {
    Setup(SetupFrame),
    RealtimeInput(RealtimeInputFrame),
}
