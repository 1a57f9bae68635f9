//! Corpus load contract and startup validation.
//!
//! A corpus is an ordered chunk store plus a prebuilt vector index sharing
//! one integer id space. A length mismatch between the two is a fatal
//! startup condition, never a per-request error.

use tracing::info;

use coach_embeddings::{ChunkStore, EmbeddingProvider, VectorIndex};

use crate::error::{PipelineError, Result};

/// A validated corpus: chunks and their precomputed embeddings.
pub struct Corpus {
    chunks: ChunkStore,
    index: VectorIndex,
}

impl Corpus {
    /// Pair a chunk store with its index, verifying the id spaces match.
    pub fn new(chunks: ChunkStore, index: VectorIndex) -> Result<Self> {
        if chunks.len() != index.len() {
            return Err(PipelineError::Configuration(format!(
                "corpus has {} chunks but the index has {} rows",
                chunks.len(),
                index.len()
            )));
        }

        info!(
            "Corpus ready: {} chunks, {}-dimensional index",
            chunks.len(),
            index.dimension()
        );
        Ok(Self { chunks, index })
    }

    /// Load a corpus from its JSON load contracts: an array of chunk texts
    /// and an array of index rows.
    pub fn from_json(chunks_json: &str, index_json: &str, dimension: usize) -> Result<Self> {
        let chunks = ChunkStore::from_json_str(chunks_json)
            .map_err(|err| PipelineError::Configuration(format!("bad chunk data: {err}")))?;
        let index = VectorIndex::from_json_str(index_json, dimension)
            .map_err(|err| PipelineError::Configuration(format!("bad index data: {err}")))?;
        Self::new(chunks, index)
    }

    /// Verify an embedding provider produces vectors of the index's
    /// dimension. A mismatch is fatal configuration, not a request error.
    pub fn validate_provider(&self, provider: &dyn EmbeddingProvider) -> Result<()> {
        if provider.dimension() != self.index.dimension() {
            return Err(PipelineError::Configuration(format!(
                "provider '{}' produces {}-dimensional vectors but the index expects {}",
                provider.name(),
                provider.dimension(),
                self.index.dimension()
            )));
        }
        Ok(())
    }

    /// The chunk store.
    pub fn chunks(&self) -> &ChunkStore {
        &self.chunks
    }

    /// The vector index.
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coach_embeddings::HashingProvider;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_matching_lengths_accepted() {
        let chunks = ChunkStore::from_texts(vec!["a".to_string(), "b".to_string()]);
        let index = VectorIndex::from_rows(vec![vec![1.0, 0.0], vec![0.0, 1.0]], 2).unwrap();
        let corpus = Corpus::new(chunks, index).unwrap();
        assert_eq!(corpus.chunks().len(), 2);
    }

    #[test]
    fn test_length_mismatch_is_fatal() {
        let chunks = ChunkStore::from_texts(vec!["a".to_string()]);
        let index = VectorIndex::from_rows(vec![vec![1.0, 0.0], vec![0.0, 1.0]], 2).unwrap();
        assert!(matches!(
            Corpus::new(chunks, index),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn test_provider_dimension_mismatch_is_fatal() {
        let chunks = ChunkStore::from_texts(vec!["a".to_string()]);
        let index = VectorIndex::from_rows(vec![vec![1.0, 0.0]], 2).unwrap();
        let corpus = Corpus::new(chunks, index).unwrap();

        let provider = HashingProvider::new(5);
        assert!(corpus.validate_provider(&provider).is_err());
    }

    #[test]
    fn test_from_json() {
        let corpus = Corpus::from_json(r#"["a", "b"]"#, "[[1.0, 0.0], [0.0, 1.0]]", 2).unwrap();
        assert_eq!(corpus.index().len(), 2);
    }

    #[test]
    fn test_from_json_malformed_is_configuration_error() {
        assert!(matches!(
            Corpus::from_json("nope", "[[1.0]]", 1),
            Err(PipelineError::Configuration(_))
        ));
    }
}
