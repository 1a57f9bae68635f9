//! Corpus chunk storage.
//!
//! Chunks are immutable after load and share the integer id space of the
//! vector index: chunk `i` is the text embedded in index row `i`.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;

/// A unit of corpus text addressable by a stable integer id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable id, equal to the chunk's position in the corpus.
    pub id: usize,

    /// The chunk text.
    pub text: String,
}

/// Ordered, read-only store of corpus chunks.
#[derive(Debug, Clone, Default)]
pub struct ChunkStore {
    chunks: Vec<Chunk>,
}

impl ChunkStore {
    /// Build a store from ordered chunk texts, assigning positional ids.
    pub fn from_texts(texts: Vec<String>) -> Self {
        let chunks = texts
            .into_iter()
            .enumerate()
            .map(|(id, text)| Chunk { id, text })
            .collect::<Vec<_>>();

        info!("Loaded chunk store with {} chunks", chunks.len());
        Self { chunks }
    }

    /// Load a store from a JSON array of strings (the corpus load contract).
    pub fn from_json_str(json: &str) -> Result<Self> {
        let texts: Vec<String> = serde_json::from_str(json)?;
        Ok(Self::from_texts(texts))
    }

    /// Look up a chunk by id. Out-of-range ids yield `None`; the caller
    /// decides whether that degrades or fails the operation.
    pub fn get(&self, id: usize) -> Option<&Chunk> {
        self.chunks.get(id)
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Iterate over all chunks in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_texts_assigns_positional_ids() {
        let store = ChunkStore::from_texts(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(0).unwrap().text, "a");
        assert_eq!(store.get(1).unwrap().id, 1);
    }

    #[test]
    fn test_get_out_of_range_is_none() {
        let store = ChunkStore::from_texts(vec!["a".to_string()]);
        assert!(store.get(7).is_none());
    }

    #[test]
    fn test_from_json_str() {
        let store = ChunkStore::from_json_str(r#"["one", "two", "three"]"#).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.get(2).unwrap().text, "three");
    }

    #[test]
    fn test_from_json_str_malformed() {
        assert!(ChunkStore::from_json_str("{not json").is_err());
    }
}
