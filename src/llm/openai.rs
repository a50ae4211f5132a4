use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::core::errors::{ForecastError, Result};

use super::provider::LlmProvider;
use super::types::{ChatMessage, ChatOptions};

/// OpenAI-compatible HTTP provider (`/v1/chat/completions`,
/// `/v1/embeddings`). Works against Ollama, LM Studio and vLLM.
#[derive(Clone)]
pub struct OpenAiCompatProvider {
    base_url: String,
    client: Client,
}

impl OpenAiCompatProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai-compat"
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        model_id: &str,
        options: &ChatOptions,
    ) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut body = json!({
            "model": model_id,
            "messages": messages,
            "stream": false,
        });
        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = options.temperature {
                obj.insert("temperature".to_string(), json!(t));
            }
            if let Some(m) = options.max_tokens {
                obj.insert("max_tokens".to_string(), json!(m));
            }
        }

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ForecastError::Generation(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ForecastError::Generation(format!(
                "chat completion returned {status}: {text}"
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ForecastError::Generation(e.to_string()))?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                ForecastError::Generation("response carried no message content".to_string())
            })
    }

    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/v1/embeddings", self.base_url);

        let body = json!({
            "model": model_id,
            "input": inputs,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ForecastError::Embedding(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ForecastError::Embedding(format!(
                "embeddings endpoint returned {status}: {text}"
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ForecastError::Embedding(e.to_string()))?;

        let data = payload["data"].as_array().ok_or_else(|| {
            ForecastError::Embedding("embeddings response carried no data array".to_string())
        })?;

        let mut embeddings = Vec::with_capacity(data.len());
        for item in data {
            let values = item["embedding"].as_array().ok_or_else(|| {
                ForecastError::Embedding("embeddings item carried no vector".to_string())
            })?;
            let vector: Vec<f32> = values
                .iter()
                .filter_map(|v| v.as_f64().map(|f| f as f32))
                .collect();
            embeddings.push(vector);
        }

        Ok(embeddings)
    }
}
