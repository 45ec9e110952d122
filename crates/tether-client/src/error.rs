//! Control-plane client error types.

use tether_core::RetryReadError;

/// Errors from control-plane calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The control plane returned a non-2xx status.
    #[error("control plane {endpoint} returned {status}: {body}")]
    ApiError {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// Response deserialization failed.
    #[error("failed to deserialize response from {endpoint}: {source}")]
    Deserialization {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The requested object is not visible yet. Polling callers treat this
    /// as retryable through the [`RetryReadError`] in the source chain.
    #[error("{endpoint}: {source}")]
    RetryRead {
        endpoint: String,
        source: RetryReadError,
    },
    /// The response did not contain the expected number of items.
    #[error("{endpoint}: expected exactly {expected} {what}, got {got}")]
    UnexpectedCount {
        endpoint: String,
        what: &'static str,
        expected: usize,
        got: usize,
    },
    /// The control plane accepted a request but reported per-item errors.
    #[error("{endpoint} reported: {}", messages.join("; "))]
    Remote {
        endpoint: String,
        messages: Vec<String>,
    },
    /// An action receiver that is not of the form `application/N`.
    #[error("invalid action receiver {0:?}: expected <application>/<unit number>")]
    InvalidReceiver(String),
    /// A principal of a category the endpoint cannot grant to.
    #[error("unsupported principal {0}: only applications can be granted secret access")]
    UnsupportedPrincipal(String),
    /// A key identifier was granted without a matching public key payload.
    #[error("no public key payload for key identifier {0:?}")]
    MissingKeyPayload(String),
    /// A resource identifier that could not be split into its parts.
    #[error("invalid resource identifier {id:?}: expected {expected}")]
    InvalidResourceId { id: String, expected: &'static str },
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),
}

impl ClientError {
    /// True for the "not visible yet" condition.
    pub fn is_retry_read(&self) -> bool {
        matches!(self, Self::RetryRead { .. })
    }
}
