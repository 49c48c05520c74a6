//! Query failure taxonomy.

use thiserror::Error;

/// Result type for query execution.
pub type QueryResult<T> = Result<T, QueryFailure>;

/// Why a query did not produce a table.
///
/// The drill iterator can degrade any of these into an empty level, but the
/// variant is kept on the level so the caller can tell "zero rows" apart from
/// "the service never answered".
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryFailure {
    /// Token acquisition against the identity provider failed.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("query failed with status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as text.
        body: String,
    },

    /// The service reported an error object inside a successful response.
    #[error("service error: {message} (code: {code})")]
    Service {
        /// Error code from the service.
        code: String,
        /// Error message from the service.
        message: String,
    },

    /// The response body could not be read as a result set.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// A workspace or dataset named in configuration does not exist.
    #[error("{kind} '{name}' not found")]
    NotFound {
        kind: &'static str,
        name: String,
    },
}

impl QueryFailure {
    /// Create a service error from an error object.
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for QueryFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for QueryFailure {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
