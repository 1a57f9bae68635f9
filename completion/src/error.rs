//! Error types for the completion client.

use thiserror::Error;

/// Result type alias for completion operations.
pub type Result<T> = std::result::Result<T, CompletionError>;

/// Errors that can occur when calling the completion service.
#[derive(Error, Debug)]
pub enum CompletionError {
    /// Credentials rejected.
    #[error("completion service rejected credentials")]
    Unauthorized,

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Service returned a server-side failure.
    #[error("completion service unavailable")]
    ServiceUnavailable,

    /// The bounded request timeout elapsed.
    #[error("completion request timed out")]
    Timeout,

    /// Response could not be decoded into generated text.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Payload failed validation before the network call.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// HTTP transport error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl CompletionError {
    /// Whether a single bounded retry is allowed for this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CompletionError::RateLimited { .. } | CompletionError::ServiceUnavailable
        )
    }
}
