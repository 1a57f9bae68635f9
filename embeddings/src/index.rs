//! Dense vector index for k-nearest-neighbor search.
//!
//! Rows are addressed by position: row `i` holds the embedding of corpus
//! chunk `i`. The index is built offline and is read-only at serve time.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::similarity::euclidean_distance;

/// A single nearest-neighbor search hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Id of the matched chunk (row position in the index).
    pub chunk_id: usize,

    /// Distance from the query (smaller is closer).
    pub distance: f32,
}

/// A read-only, id-aligned vector index.
///
/// Search is exact: every row is scored against the query and the `k`
/// closest rows are returned in ascending distance order. Ties keep the
/// original row order.
pub struct VectorIndex {
    rows: Vec<Embedding>,
    dimension: usize,
}

impl VectorIndex {
    /// Create an empty index with a fixed dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            rows: Vec::new(),
            dimension,
        }
    }

    /// Build an index from precomputed rows.
    ///
    /// Every row must match `dimension`; a short or long row is a build
    /// artifact corruption and fails the whole load.
    pub fn from_rows(rows: Vec<Embedding>, dimension: usize) -> Result<Self> {
        for row in &rows {
            if row.len() != dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: dimension,
                    actual: row.len(),
                });
            }
        }

        info!("Loaded vector index with {} rows", rows.len());
        Ok(Self { rows, dimension })
    }

    /// Load an index from a JSON array of rows.
    pub fn from_json_str(json: &str, dimension: usize) -> Result<Self> {
        let rows: Vec<Embedding> = serde_json::from_str(json)?;
        Self::from_rows(rows, dimension)
    }

    /// Append a row to the index.
    pub fn push(&mut self, row: Embedding) -> Result<()> {
        if row.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Expected dimension of queries and rows.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of rows in the index.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the index has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Find the `k` rows closest to `query`.
    ///
    /// Returns at most `k` hits sorted by non-decreasing distance. When the
    /// index holds fewer than `k` rows, all of them are returned; that is
    /// not an error. `k == 0` and a query of the wrong dimension are caller
    /// bugs and fail.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Err(EmbeddingError::InvalidTopK);
        }
        if query.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(OrderedFloat<f32>, usize)> = Vec::with_capacity(self.rows.len());
        for (chunk_id, row) in self.rows.iter().enumerate() {
            let distance = euclidean_distance(query, row)?;
            scored.push((OrderedFloat(distance), chunk_id));
        }

        // Stable sort keeps row order for equal distances.
        scored.sort_by_key(|(distance, _)| *distance);

        let hits = scored
            .into_iter()
            .take(k)
            .map(|(distance, chunk_id)| SearchHit {
                chunk_id,
                distance: distance.0,
            })
            .collect();

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fixture_index() -> VectorIndex {
        VectorIndex::from_rows(
            vec![
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![0.0, 0.0, 1.0],
            ],
            3,
        )
        .unwrap()
    }

    #[test]
    fn test_search_returns_nearest_first() {
        let index = fixture_index();
        let hits = index.search(&[0.9, 0.1, 0.0], 2).unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_id, 0);
        assert_eq!(hits[1].chunk_id, 1);
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[test]
    fn test_search_clamps_k_to_rows() {
        let index = fixture_index();
        let hits = index.search(&[1.0, 0.0, 0.0], 10).unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn test_search_no_duplicate_ids() {
        let index = fixture_index();
        let hits = index.search(&[0.5, 0.5, 0.5], 3).unwrap();
        let mut ids: Vec<usize> = hits.iter().map(|h| h.chunk_id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), hits.len());
    }

    #[test]
    fn test_search_ties_keep_row_order() {
        let index = VectorIndex::from_rows(
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 0.0]],
            2,
        )
        .unwrap();

        // Rows 0 and 2 are equidistant from the query.
        let hits = index.search(&[0.5, 0.5], 3).unwrap();
        assert_eq!(hits[0].chunk_id, 0);
        assert_eq!(hits[1].chunk_id, 2);
        assert_eq!(hits[2].chunk_id, 1);
    }

    #[test]
    fn test_search_zero_k_is_error() {
        let index = fixture_index();
        assert!(matches!(
            index.search(&[1.0, 0.0, 0.0], 0),
            Err(EmbeddingError::InvalidTopK)
        ));
    }

    #[test]
    fn test_search_dimension_mismatch() {
        let index = fixture_index();
        assert!(matches!(
            index.search(&[1.0, 0.0], 1),
            Err(EmbeddingError::DimensionMismatch { expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn test_search_empty_index_returns_no_hits() {
        let index = VectorIndex::new(3);
        let hits = index.search(&[1.0, 0.0, 0.0], 5).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_from_rows_rejects_ragged_rows() {
        let result = VectorIndex::from_rows(vec![vec![1.0, 0.0], vec![1.0]], 2);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_json_str() {
        let index = VectorIndex::from_json_str("[[1.0, 0.0], [0.0, 1.0]]", 2).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.dimension(), 2);
    }
}
