use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::core::errors::{ForecastError, Result};

/// Network seam for the document cache. Implementations download the raw
/// bytes behind a URL; the cache owns validation and storage.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct HttpDocumentFetcher {
    client: Client,
}

impl HttpDocumentFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DocumentFetcher for HttpDocumentFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ForecastError::fetch(url, e))?;

        let response = response
            .error_for_status()
            .map_err(|e| ForecastError::fetch(url, e))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ForecastError::fetch(url, e))?;

        Ok(bytes.to_vec())
    }
}
