//! # Embeddings
//!
//! Embedding generation and nearest-neighbor search for the coach
//! answering pipeline.
//!
//! - **Embedding Generation**: convert text to dense vectors, either via a
//!   remote OpenAI-compatible API or a deterministic offline provider
//! - **Vector Search**: k-nearest-neighbor lookup over a precomputed,
//!   id-aligned index
//! - **Chunk Store**: corpus texts addressed by the same id space as the
//!   index rows

pub mod chunks;
pub mod error;
pub mod index;
pub mod provider;
pub mod similarity;

pub use chunks::{Chunk, ChunkStore};
pub use error::{EmbeddingError, Result};
pub use index::{SearchHit, VectorIndex};
pub use provider::{EmbeddingProvider, HashingProvider, RemoteProvider};
pub use similarity::{cosine_similarity, euclidean_distance, normalize};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;
