use thiserror::Error;

/// Result type for duplex session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors raised by a duplex session.
///
/// `Initialization` and `Forwarding` are fatal for the session that raised them.
/// `Delivery` is best effort: callers log it and carry on.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    // ─────────────────────────────────────────────────────────────────────────────
    // Model stream
    // ─────────────────────────────────────────────────────────────────────────────

    /// The model stream could not be established, or a bootstrap event was rejected
    #[error("Failed to initialize model stream: {0}")]
    Initialization(String),

    /// Sending an event to the model stream failed
    #[error("Failed to forward event to model stream: {0}")]
    Forwarding(String),

    /// The model stream reported an error while reading
    #[error("Model stream error: {0}")]
    Stream(String),

    // ─────────────────────────────────────────────────────────────────────────────
    // Client transport
    // ─────────────────────────────────────────────────────────────────────────────

    /// Sending a frame to the client failed
    #[error("Failed to deliver frame to client: {0}")]
    Delivery(String),

    // ─────────────────────────────────────────────────────────────────────────────
    // Lifecycle and protocol
    // ─────────────────────────────────────────────────────────────────────────────

    /// The session is not accepting events in its current state
    #[error("Session is not active")]
    NotActive,

    /// Operation is not valid for the current lifecycle state
    #[error("Invalid session state: {0}")]
    InvalidState(String),

    /// A malformed event or frame was received
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// An event could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SessionError {
    /// Whether this error ends the session that raised it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SessionError::Initialization(_)
                | SessionError::Forwarding(_)
                | SessionError::Stream(_)
                | SessionError::NotActive
        )
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Serialization(err.to_string())
    }
}
