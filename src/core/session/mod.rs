//! Duplex session between a client transport and the model stream.
//!
//! A [`DuplexSession`] owns one model stream at a time and two background
//! tasks per stream: the response processor (model events to client frames
//! and tool submissions) and the audio output task (buffered assistant audio).
//! Tool tasks are owned by the session's [`ToolEngine`](crate::core::tools::ToolEngine).

pub mod audio_output;
pub mod config;
pub mod dedup;
mod duplex;
mod response;
mod shared;
pub mod speech;
mod state;

pub use audio_output::{AudioOutputHandle, OutputBuffer, spawn_audio_output};
pub use config::{DEFAULT_SYSTEM_PROMPT, DEFAULT_VOICE, SessionConfig};
pub use dedup::TextDedupCache;
pub use duplex::{DuplexSession, SessionHandle, SessionSnapshot};
pub use response::ResponseProcessor;
pub use shared::{ContentIds, SessionShared};
pub use speech::{SpeechTimer, is_silent_chunk};
pub use state::SessionState;
