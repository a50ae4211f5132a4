use async_trait::async_trait;

use crate::core::errors::Result;

use super::types::{ChatMessage, ChatOptions};

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logs and audit records.
    fn name(&self) -> &str;

    /// Non-streaming chat completion.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        model_id: &str,
        options: &ChatOptions,
    ) -> Result<String>;

    /// Batch embeddings, order-preserving.
    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>>;
}
