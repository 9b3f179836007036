//! Client WebSocket message types
//!
//! Incoming frames are JSON text with a `type` discriminator. Outgoing frames
//! are [`OutgoingFrame`](crate::core::transport::OutgoingFrame)s.

use serde::{Deserialize, Serialize};

/// Maximum size of one base64 audio chunk (1 MB)
pub const MAX_AUDIO_CHUNK_SIZE: usize = 1024 * 1024;

/// Maximum length of a voice identifier
pub const MAX_VOICE_NAME_SIZE: usize = 64;

// =============================================================================
// Incoming Messages (Client -> Server)
// =============================================================================

/// Incoming WebSocket messages from the client
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IncomingMessage {
    /// Base64 PCM16 mono 16 kHz microphone audio; empty means silence
    Audio {
        #[serde(default)]
        data: String,
    },

    /// Restart the model stream with another voice
    VoiceChange { voice: String },

    /// End the session
    End,
}

/// Validation errors for incoming messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageValidationError {
    AudioTooLarge { size: usize, max: usize },
    VoiceNameTooLong { size: usize, max: usize },
}

impl std::fmt::Display for MessageValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AudioTooLarge { size, max } => {
                write!(f, "Audio chunk too large: {} bytes (max: {} bytes)", size, max)
            }
            Self::VoiceNameTooLong { size, max } => {
                write!(f, "Voice name too long: {} bytes (max: {} bytes)", size, max)
            }
        }
    }
}

impl std::error::Error for MessageValidationError {}

impl IncomingMessage {
    pub fn validate_size(&self) -> Result<(), MessageValidationError> {
        match self {
            IncomingMessage::Audio { data } if data.len() > MAX_AUDIO_CHUNK_SIZE => {
                Err(MessageValidationError::AudioTooLarge {
                    size: data.len(),
                    max: MAX_AUDIO_CHUNK_SIZE,
                })
            }
            IncomingMessage::VoiceChange { voice } if voice.len() > MAX_VOICE_NAME_SIZE => {
                Err(MessageValidationError::VoiceNameTooLong {
                    size: voice.len(),
                    max: MAX_VOICE_NAME_SIZE,
                })
            }
            _ => Ok(()),
        }
    }
}
