//! Event codec for the speech-to-speech model stream.
//!
//! Every event exchanged with the model service is a JSON object of the form
//! `{ "event": { "<eventName>": { ... } } }`. Outbound events are typed
//! constructors serialized through [`OutboundEvent::to_json`]; inbound events
//! are decoded with [`InboundEvent::decode`].
//!
//! # Outbound (gateway -> model)
//! - `sessionStart` - inference parameters
//! - `promptStart` - output configuration, voice, tool configuration
//! - `contentStart` - opens a text, audio, or tool-result content stream
//! - `textInput` / `audioInput` / `toolResult` - content payloads
//! - `contentEnd` / `promptEnd` / `sessionEnd` - teardown
//!
//! # Inbound (model -> gateway)
//! - `contentStart` - speaker role and generation stage
//! - `textOutput` - transcript text (user or assistant)
//! - `audioOutput` - base64 PCM audio
//! - `toolUse` - tool invocation request
//! - `contentEnd` - end of a content stream (type `TOOL` dispatches a pending tool use)
//! - `completionStart` / `completionEnd` / `usageEvent`

mod inbound;
mod outbound;

pub use inbound::{
    AudioOutputEvent, ContentEndEvent, ContentStartEvent, InboundEvent, TextOutputEvent,
    ToolUseEvent,
};
pub use outbound::{
    AudioConfiguration, ContentInput, ContentRef, ContentStart, ContentType, InferenceConfiguration,
    MediaConfiguration, OutboundEvent, PromptRef, PromptStart, Role, SessionEnd, SessionStart,
    ToolConfiguration, ToolInputSchema, ToolResultInputConfiguration, ToolSpec,
    ToolSpecification,
};

/// Sample rate of user audio sent to the model (PCM 16-bit mono)
pub const INPUT_SAMPLE_RATE_HZ: u32 = 16_000;

/// Sample rate of assistant audio produced by the model (PCM 16-bit mono)
pub const OUTPUT_SAMPLE_RATE_HZ: u32 = 24_000;

/// Bits per PCM sample in both directions
pub const SAMPLE_SIZE_BITS: u32 = 16;

/// Audio channel count in both directions
pub const CHANNEL_COUNT: u32 = 1;
