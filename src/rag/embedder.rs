//! Embedding front-end over the LLM provider's embeddings endpoint.

use std::sync::Arc;

use crate::core::errors::{ForecastError, Result};
use crate::llm::LlmProvider;

/// Maps text to fixed-dimension vectors through a provider. The same text
/// under the same model always yields the same vector; mixing models in
/// one index is rejected downstream by the index's dimension check.
pub struct Embedder {
    provider: Arc<dyn LlmProvider>,
    model_id: String,
}

impl Embedder {
    pub fn new(provider: Arc<dyn LlmProvider>, model_id: impl Into<String>) -> Self {
        Self {
            provider,
            model_id: model_id.into(),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_many(std::slice::from_ref(&text.to_string())).await?;
        vectors
            .pop()
            .ok_or_else(|| ForecastError::Embedding("provider returned no vector".to_string()))
    }

    /// Embed a batch, preserving input order.
    pub async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(pos) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(ForecastError::Embedding(format!(
                "input {pos} is empty or whitespace-only"
            )));
        }

        let vectors = self.provider.embed(texts, &self.model_id).await?;

        if vectors.len() != texts.len() {
            return Err(ForecastError::Embedding(format!(
                "provider returned {} vectors for {} inputs",
                vectors.len(),
                texts.len()
            )));
        }
        let dim = vectors[0].len();
        if dim == 0 || vectors.iter().any(|v| v.len() != dim) {
            return Err(ForecastError::Embedding(
                "provider returned vectors of inconsistent dimension".to_string(),
            ));
        }

        Ok(vectors)
    }
}
