//! Error types for dmp-eval-lookup

use thiserror::Error;

/// Errors that can occur while talking to a lookup service.
///
/// Checks never see these: the clients fold them into a failed
/// [`crate::LookupResponse`].
#[derive(Error, Debug)]
pub enum LookupError {
    /// The HTTP client could not be constructed
    #[error("HTTP client setup failed: {0}")]
    ClientSetup(String),

    /// Transport-level failure (connect, timeout, TLS)
    #[error("HTTP error: {0}")]
    Http(String),

    /// The service answered with a non-success status
    #[error("service returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body was not the expected JSON
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LookupError {
    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            LookupError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        LookupError::Http(err.to_string())
    }
}
