//! Error taxonomy for the answering pipeline.
//!
//! Fatal configuration problems surface when the engine is constructed;
//! everything that can go wrong per request is converted at the request
//! boundary into a classified, user-visible failure answer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use coach_completion::CompletionError;
use coach_embeddings::EmbeddingError;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur in the answering pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Fatal startup-time misconfiguration. An engine in this state must
    /// not accept traffic, so this is only returned from constructors.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The inbound request was unusable (empty question).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Embedding the question failed.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// The completion call failed.
    #[error("completion error: {0}")]
    Completion(#[from] CompletionError),
}

/// Prefix on every user-visible failure answer so client UIs can detect
/// them and offer a retry.
pub const FAILURE_PREFIX: &str = "[error] ";

/// Boundary classification of a per-request failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidRequest,
    Embedding,
    Unauthorized,
    RateLimited,
    ServiceUnavailable,
    Timeout,
    MalformedResponse,
    Internal,
}

impl FailureKind {
    /// Classify a pipeline error for the boundary response.
    pub fn classify(err: &PipelineError) -> Self {
        match err {
            PipelineError::InvalidRequest(_) => FailureKind::InvalidRequest,
            PipelineError::Embedding(_) => FailureKind::Embedding,
            PipelineError::Completion(err) => match err {
                CompletionError::Unauthorized => FailureKind::Unauthorized,
                CompletionError::RateLimited { .. } => FailureKind::RateLimited,
                CompletionError::ServiceUnavailable => FailureKind::ServiceUnavailable,
                CompletionError::Timeout => FailureKind::Timeout,
                CompletionError::MalformedResponse(_) => FailureKind::MalformedResponse,
                CompletionError::InvalidPayload(_) | CompletionError::Http(_) => {
                    FailureKind::Internal
                }
            },
            PipelineError::Configuration(_) => FailureKind::Internal,
        }
    }

    /// Short user-facing explanation, prefixed so clients can tell failure
    /// answers from normal ones.
    pub fn user_answer(&self) -> String {
        let detail = match self {
            FailureKind::InvalidRequest => "I need a question to answer.",
            FailureKind::Embedding => {
                "I couldn't process the question right now. Please try again."
            }
            FailureKind::Unauthorized => {
                "The answering service rejected this deployment's credentials."
            }
            FailureKind::RateLimited => {
                "The answering service is busy right now. Please try again in a moment."
            }
            FailureKind::ServiceUnavailable => {
                "The answering service is temporarily unavailable. Please try again shortly."
            }
            FailureKind::Timeout => {
                "The answer took too long to generate. Please try again."
            }
            FailureKind::MalformedResponse => {
                "The answering service returned something I couldn't read. Please try again."
            }
            FailureKind::Internal => "Something went wrong while answering. Please try again.",
        };
        format!("{FAILURE_PREFIX}{detail}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_classify_completion_timeout() {
        let err = PipelineError::Completion(CompletionError::Timeout);
        assert_eq!(FailureKind::classify(&err), FailureKind::Timeout);
    }

    #[test]
    fn test_classify_rate_limited() {
        let err = PipelineError::Completion(CompletionError::RateLimited {
            retry_after_secs: 3,
        });
        assert_eq!(FailureKind::classify(&err), FailureKind::RateLimited);
    }

    #[test]
    fn test_user_answers_carry_prefix() {
        for kind in [
            FailureKind::InvalidRequest,
            FailureKind::Embedding,
            FailureKind::Unauthorized,
            FailureKind::RateLimited,
            FailureKind::ServiceUnavailable,
            FailureKind::Timeout,
            FailureKind::MalformedResponse,
            FailureKind::Internal,
        ] {
            assert!(kind.user_answer().starts_with(FAILURE_PREFIX));
        }
    }
}
