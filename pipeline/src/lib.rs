//! # Pipeline
//!
//! The retrieval-augmented answering engine:
//!
//! ```text
//! question ──► EmbeddingProvider ──► VectorIndex.search(k)
//!                                          │
//!                                    ChunkStore lookup
//!                                          │
//!   ProfileStore ─┐                        ▼
//!                 ├──────────────► PromptAssembler ──► CompletionClient
//!   Conversation ─┘                                          │
//!     Memory ◄───────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use coach_pipeline::{AskEngine, AskRequest, Corpus};
//!
//! let corpus = Corpus::from_json(&chunks_json, &index_json, 1536)?;
//! let engine = AskEngine::builder().with_corpus(corpus).build()?;
//!
//! let outcome = engine.ask(AskRequest::new("Which wax today?")).await;
//! println!("{}", outcome.answer);
//! ```

pub mod config;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod prompt;

pub use config::{
    CompletionConfig, EmbeddingConfig, EmbeddingProviderType, MemoryConfig, PipelineConfig,
    RetrievalConfig, RetryConfig,
};
pub use corpus::Corpus;
pub use engine::{AskEngine, AskEngineBuilder, AskOutcome, AskRequest};
pub use error::{FAILURE_PREFIX, FailureKind, PipelineError, Result};
pub use prompt::PromptAssembler;

// Re-export from dependencies for convenience
pub use coach_completion::{ChatClient, CompletionClient, PromptPayload, RetryPolicy};
pub use coach_embeddings::{ChunkStore, EmbeddingProvider, VectorIndex};
pub use coach_memory::{ConversationMemory, ConversationTurn, ProfileStore, Role};
