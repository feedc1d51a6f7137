//! Error types for the chat client.

/// Top-level error type for the streaming chat client.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Invalid user input (empty message, bad argument).
    #[error("input error: {0}")]
    Input(String),

    /// Network or HTTP failure talking to the chat backend.
    ///
    /// Cancellation of a superseded stream is *not* a transport error;
    /// cancelled streams are discarded silently.
    #[error("transport error: {0}")]
    Transport(String),

    /// Stream decoding error (unrecoverable framing problem).
    ///
    /// Individual malformed event lines are skipped and logged, not
    /// surfaced as errors; this variant covers failures of the decode
    /// machinery itself.
    #[error("decode error: {0}")]
    Decode(String),

    /// Microphone capture or transcription error.
    #[error("capture error: {0}")]
    Capture(String),

    /// Speech synthesis or playback error.
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Session persistence error.
    #[error("store error: {0}")]
    Store(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ChatError>;
