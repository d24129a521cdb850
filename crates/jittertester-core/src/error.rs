//! Error types for the jitter analysis core
//!
//! Statistical problems (too few chunks, empty payloads) are not errors here:
//! they surface as flags in the data. Only conditions that end a session or
//! break persistence are represented.

use thiserror::Error;

/// Errors that can occur while recording or persisting a session
#[derive(Error, Debug)]
pub enum JitterError {
    #[error("Session log reached its limit of {limit} observations")]
    ResourceExhausted { limit: usize },

    #[error("Session driver is no longer running")]
    SessionClosed,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

impl JitterError {
    /// Whether this error terminated the session (as opposed to a persistence failure)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            JitterError::ResourceExhausted { .. } | JitterError::SessionClosed
        )
    }
}
