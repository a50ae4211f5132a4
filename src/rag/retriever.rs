use std::sync::Arc;

use crate::core::errors::Result;
use crate::rag::embedder::Embedder;
use crate::rag::index::{ScoredChunk, VectorIndex};

/// Embeds a query and runs top-K search against a request-scoped index.
pub struct Retriever {
    embedder: Arc<Embedder>,
    default_k: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<Embedder>, default_k: usize) -> Self {
        Self {
            embedder,
            default_k,
        }
    }

    /// `k` falls back to the configured default. A corpus with fewer than
    /// `k` chunks returns everything ranked, not an error.
    pub async fn retrieve(
        &self,
        query: &str,
        index: &VectorIndex,
        k: Option<usize>,
    ) -> Result<Vec<ScoredChunk>> {
        let k = k.unwrap_or(self.default_k);
        if index.is_empty() {
            return Ok(Vec::new());
        }
        let query_vector = self.embedder.embed(query).await?;
        let results = index.search(&query_vector, k)?;
        tracing::debug!(
            query = query,
            k,
            hits = results.len(),
            "retrieval complete"
        );
        Ok(results)
    }
}
