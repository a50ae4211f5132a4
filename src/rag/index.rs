//! Request-scoped in-memory vector index.
//!
//! The index is a derived, rebuildable artifact: it borrows nothing from
//! outside the request and is dropped with it, so there is no cross-request
//! locking and no unbounded growth. Search is exact (brute force); ties in
//! score break by insertion order for determinism.

use ndarray::ArrayView1;

use crate::core::errors::{ForecastError, Result};
use crate::rag::chunker::Chunk;

/// Distance metric, fixed at construction. Must match the metric the
/// embedding model was trained for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Cosine,
    InnerProduct,
}

#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

struct IndexEntry {
    chunk: Chunk,
    vector: Vec<f32>,
}

pub struct VectorIndex {
    metric: Metric,
    dimension: Option<usize>,
    entries: Vec<IndexEntry>,
    /// Precomputed L2 norms, filled by `build()`.
    norms: Vec<f32>,
    built: bool,
}

impl VectorIndex {
    pub fn new(metric: Metric) -> Self {
        Self {
            metric,
            dimension: None,
            entries: Vec::new(),
            norms: Vec::new(),
            built: true, // an empty index is trivially searchable
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Add a chunk vector. The first insertion pins the index dimension;
    /// later insertions must match it (mixing embedding models is a bug).
    pub fn add(&mut self, chunk: Chunk, vector: Vec<f32>) -> Result<()> {
        if vector.is_empty() {
            return Err(ForecastError::Embedding("empty vector".to_string()));
        }
        match self.dimension {
            None => self.dimension = Some(vector.len()),
            Some(dim) if dim != vector.len() => {
                return Err(ForecastError::Index(format!(
                    "dimension mismatch: index has {dim}, vector has {}",
                    vector.len()
                )));
            }
            Some(_) => {}
        }

        self.entries.push(IndexEntry { chunk, vector });
        self.built = false;
        Ok(())
    }

    /// Finalize the index after a batch of additions. Required before
    /// `search` once entries exist.
    pub fn build(&mut self) {
        self.norms = self
            .entries
            .iter()
            .map(|e| ArrayView1::from(&e.vector).dot(&ArrayView1::from(&e.vector)).sqrt())
            .collect();
        self.built = true;
    }

    /// Exact top-k search. An empty index returns an empty result, not an
    /// error; fewer than `k` entries returns everything ranked.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if !self.built {
            return Err(ForecastError::Index(
                "search before build(); call build() after additions".to_string(),
            ));
        }
        if let Some(dim) = self.dimension {
            if query.len() != dim {
                return Err(ForecastError::Index(format!(
                    "query dimension {} does not match index dimension {dim}",
                    query.len()
                )));
            }
        }

        let query_view = ArrayView1::from(query);
        let query_norm = query_view.dot(&query_view).sqrt();

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let dot = query_view.dot(&ArrayView1::from(&entry.vector));
                let score = match self.metric {
                    Metric::InnerProduct => dot,
                    Metric::Cosine => {
                        let denom = query_norm * self.norms[i];
                        if denom <= f32::EPSILON {
                            0.0
                        } else {
                            dot / denom
                        }
                    }
                };
                (i, score)
            })
            .collect();

        // Score descending, insertion order ascending on ties.
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::cache::DocumentKind;

    fn chunk(index: usize, text: &str) -> Chunk {
        Chunk {
            doc_key: "doc".to_string(),
            doc_url: "https://example.com/doc".to_string(),
            kind: DocumentKind::Transcript,
            index,
            text: text.to_string(),
            start: index * 10,
            end: index * 10 + 10,
            section: None,
        }
    }

    fn build_index(vectors: &[Vec<f32>]) -> VectorIndex {
        let mut index = VectorIndex::new(Metric::Cosine);
        for (i, v) in vectors.iter().enumerate() {
            index.add(chunk(i, &format!("chunk {i}")), v.clone()).expect("add");
        }
        index.build();
        index
    }

    #[test]
    fn empty_index_returns_empty_result() {
        let index = VectorIndex::new(Metric::Cosine);
        let results = index.search(&[1.0, 0.0], 5).expect("search");
        assert!(results.is_empty());
    }

    #[test]
    fn scores_are_non_increasing() {
        let index = build_index(&[
            vec![0.9, 0.1],
            vec![0.1, 0.9],
            vec![1.0, 0.0],
            vec![0.5, 0.5],
        ]);
        let results = index.search(&[1.0, 0.0], 4).expect("search");
        assert_eq!(results.len(), 4);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(results[0].chunk.index, 2);
    }

    #[test]
    fn smaller_k_is_a_prefix_of_larger_k() {
        let index = build_index(&[
            vec![0.9, 0.1],
            vec![0.1, 0.9],
            vec![1.0, 0.0],
            vec![0.5, 0.5],
        ]);
        let small = index.search(&[1.0, 0.0], 2).expect("search");
        let large = index.search(&[1.0, 0.0], 4).expect("search");
        for (a, b) in small.iter().zip(large.iter()) {
            assert_eq!(a.chunk.index, b.chunk.index);
        }
    }

    #[test]
    fn ties_break_by_insertion_order() {
        // Identical vectors: scores tie exactly, earlier chunk wins.
        let index = build_index(&[vec![1.0, 0.0], vec![1.0, 0.0], vec![1.0, 0.0]]);
        let results = index.search(&[1.0, 0.0], 3).expect("search");
        let order: Vec<usize> = results.iter().map(|r| r.chunk.index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn k_larger_than_index_returns_everything() {
        let index = build_index(&[vec![1.0, 0.0], vec![0.0, 1.0]]);
        let results = index.search(&[1.0, 0.0], 50).expect("search");
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let mut index = build_index(&[vec![1.0, 0.0]]);
        let err = index
            .add(chunk(1, "bad"), vec![1.0, 0.0, 0.0])
            .expect_err("dim mismatch must fail");
        assert!(matches!(err, ForecastError::Index(_)));

        let err = index.search(&[1.0, 0.0, 0.0], 1).expect_err("query dim must fail");
        assert!(matches!(err, ForecastError::Index(_)));
    }

    #[test]
    fn search_before_build_is_an_error() {
        let mut index = VectorIndex::new(Metric::Cosine);
        index.add(chunk(0, "c"), vec![1.0, 0.0]).expect("add");
        let err = index.search(&[1.0, 0.0], 1).expect_err("unbuilt index");
        assert!(matches!(err, ForecastError::Index(_)));
    }
}
