//! # Completion
//!
//! The outbound half of the coach answering pipeline: a validated prompt
//! payload and a client that sends it to a remote OpenAI-compatible chat
//! completion service with a bounded timeout, a classified failure
//! taxonomy, and an optional single bounded retry.

pub mod client;
pub mod error;
pub mod payload;

pub use client::{ChatClient, CompletionClient, RetryPolicy};
pub use error::{CompletionError, Result};
pub use payload::PromptPayload;
