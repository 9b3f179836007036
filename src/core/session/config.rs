use std::time::Duration;

use crate::core::events::InferenceConfiguration;

/// Instruction sent as the system turn of every prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a warm and engaging assistant with a vibrant personality. \
Your role is to engage in a natural, real-time spoken conversation, exchanging transcripts with the user. \
Express a range of emotions such as enthusiasm, empathy and curiosity, and adapt your tone based on the user's cues. \
Keep your responses short and lively, generally two or three sentences, adding a touch of humor or warmth when appropriate. \
Encourage the user to share thoughts, making the conversation feel personal and engaging.";

pub const DEFAULT_VOICE: &str = "tiffany";

/// Per-session protocol and buffering parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Voice used at prompt start
    pub voice: String,
    /// Voices a client may switch to
    pub available_voices: Vec<String>,
    pub system_prompt: String,
    pub inference: InferenceConfiguration,
    /// Silence that must persist before user speech counts as ended
    pub silence_threshold: Duration,
    /// RMS level (0.0-1.0) below which a PCM chunk counts as silence; 0 disables
    pub silence_rms_threshold: f64,
    /// Window in which identical (role, text) pairs are suppressed
    pub dedup_cooldown: Duration,
    /// Combined base64 size that triggers an audio flush
    pub audio_flush_threshold: usize,
    /// Flush whatever is buffered when no chunk arrives for this long
    pub audio_flush_timeout: Duration,
    /// Delay between bootstrap events
    pub bootstrap_pacing: Duration,
    /// Delay between teardown events
    pub teardown_pacing: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            voice: DEFAULT_VOICE.to_string(),
            available_voices: vec!["matthew".to_string(), "tiffany".to_string()],
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            inference: InferenceConfiguration::default(),
            silence_threshold: Duration::from_millis(500),
            silence_rms_threshold: 0.0,
            dedup_cooldown: Duration::from_secs(2),
            audio_flush_threshold: 1024,
            audio_flush_timeout: Duration::from_millis(20),
            bootstrap_pacing: Duration::from_millis(50),
            teardown_pacing: Duration::from_millis(100),
        }
    }
}

impl SessionConfig {
    pub fn is_available_voice(&self, voice: &str) -> bool {
        self.available_voices.iter().any(|v| v == voice)
    }
}
