//! Duplex session WebSocket handlers
//!
//! # Protocol
//!
//! ## Client → Server
//!
//! - **audio**: `{"type": "audio", "data": "<base64 PCM16 16 kHz>"}`; empty data is silence
//! - **voice_change**: `{"type": "voice_change", "voice": "matthew"}`
//! - **end**: `{"type": "end"}`
//!
//! ## Server → Client
//!
//! - **text**: transcript with `role`, `timestamp`, `unix_timestamp`, `is_speculative`
//! - **audio**: base64 PCM16 24 kHz assistant audio
//! - **latency**: seconds between end of user speech and first assistant audio
//! - **tool_status**: background tool progress and terminal status

mod handler;
pub mod messages;

pub use handler::session_handler;
