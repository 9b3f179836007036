use std::fmt;

use serde::Serialize;

/// Lifecycle of a duplex session.
///
/// `Uninitialized -> Active -> Closing -> Closed`, with `Closing ->
/// Uninitialized` for a voice change restart. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Active,
    /// Teardown events are still being sent
    Closing,
    Closed,
}

impl SessionState {
    /// Whether events may still be sent to the model stream.
    pub fn accepts_events(self) -> bool {
        matches!(self, SessionState::Active | SessionState::Closing)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Active => "active",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        };
        f.write_str(s)
    }
}
