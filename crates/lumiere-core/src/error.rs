//! Error types for the Lumiere client
//!
//! Every failure a backend call or a user action can produce:
//! - transport failures (connection refused, DNS, TLS)
//! - non-OK HTTP statuses
//! - application errors the backend reports in a `{"error": ...}` body
//! - malformed responses
//! - client-side validation (empty input, missing selection)
//! - request timeouts
//! - local store I/O

use std::time::Duration;

/// Main client error type
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request never produced a response
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-success status
    #[error("HTTP error! status: {status}")]
    Status {
        /// Numeric HTTP status
        status: u16,
        /// Response body, if any was readable
        body: String,
    },

    /// The backend answered 200 but signalled a failure in the body
    #[error("{0}")]
    Backend(String),

    /// Response did not have the expected shape
    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Rejected before anything was sent
    #[error("{0}")]
    Validation(String),

    /// Request was aborted after the configured window
    #[error("Request timed out ({}s). The server might be slow or unresponsive.", .0.as_secs())]
    Timeout(Duration),

    /// Local store could not be read or written
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// True for failures where nothing reached the backend or nothing came back.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_) | Self::Status { .. })
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
