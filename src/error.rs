use thiserror::Error;

/// Errors raised by the portal client. All of them are fatal at this layer:
/// nothing is retried, and a failed call never returns a partial result.
#[derive(Debug, Error)]
pub enum LinkyError {
    /// Login was refused, the session cookie never showed up, or a data
    /// call was attempted on a session that is not authenticated.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Network or TLS level failure, message passed through from the
    /// transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// The portal answered with something that is not the expected JSON
    /// graph payload.
    #[error("could not decode portal response: {0}")]
    Decode(String),

    /// Caller-supplied date arguments are invalid or out of the allowed
    /// range. Raised before any network I/O.
    #[error("invalid request: {0}")]
    Validation(String),
}

impl From<reqwest::Error> for LinkyError {
    fn from(e: reqwest::Error) -> Self {
        LinkyError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for LinkyError {
    fn from(e: serde_json::Error) -> Self {
        LinkyError::Decode(e.to_string())
    }
}
