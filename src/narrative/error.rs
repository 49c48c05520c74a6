//! Narrative synthesis errors.

use thiserror::Error;

/// Result type for narrative synthesis.
pub type NarrativeResult<T> = Result<T, NarrativeError>;

#[derive(Error, Debug)]
pub enum NarrativeError {
    #[error("failed to reach language model: {0}")]
    Transport(String),

    #[error("language model returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("language model returned no choices")]
    EmptyResponse,

    #[error("malformed completion: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for NarrativeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for NarrativeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
