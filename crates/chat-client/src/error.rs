use serde_json::Value;
use thiserror::Error;

use crate::transport::TransportError;

/// Errors surfaced by [`ChatClient::call`](crate::ChatClient::call).
#[derive(Debug, Error)]
pub enum Error {
    /// A required configuration value is missing or empty. Raised
    /// before any network call.
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),

    /// The call description is malformed. Raised before any network call.
    #[error("invalid request: {0}")]
    InvalidInput(String),

    /// Network-level failure, including cancellation and timeout.
    /// Propagated unmodified and never retried.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Non-success response from the provider that the budget retry
    /// did not recover.
    #[error("provider error (HTTP {status}): {message}")]
    Api {
        status: u16,
        message: String,
        /// Parsed error payload when the body was JSON, otherwise the raw text.
        body: Value,
    },

    /// Success status but the body is not a JSON object.
    #[error("{message}")]
    MalformedResponse { status: u16, message: String },

    /// JSON serialization failure while assembling the wire body.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// HTTP status attached to the error, when one applies.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } | Error::MalformedResponse { status, .. } => Some(*status),
            _ => None,
        }
    }
}
