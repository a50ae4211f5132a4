//! Content-addressed document cache.
//!
//! Fetched documents are stored on disk keyed by the SHA-256 of their
//! trimmed URL. A cache hit never touches the network, and concurrent
//! fetches of the same URL are coalesced into a single download
//! (single-flight). Writes go through a temp file plus atomic rename so
//! an aborted fetch never leaves a partial entry behind.

mod fetcher;

pub use fetcher::{DocumentFetcher, HttpDocumentFetcher};

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::core::errors::{ForecastError, Result};
use crate::extract;

/// Accepted document kinds, declared by the caller per URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    FinancialReport,
    Transcript,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::FinancialReport => "financial_report",
            DocumentKind::Transcript => "transcript",
        }
    }
}

/// An immutable fetched document. Owned exclusively by the cache.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub key: String,
    pub url: String,
    pub kind: DocumentKind,
    pub bytes: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheMeta {
    url: String,
    kind: DocumentKind,
    fetched_at: DateTime<Utc>,
    size_bytes: usize,
}

/// Stable content key for a URL.
pub fn content_key(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.trim().as_bytes());
    hex::encode(hasher.finalize())
}

pub struct DocumentCache {
    root: PathBuf,
    fetcher: Arc<dyn DocumentFetcher>,
    /// Per-key gates coalescing concurrent misses for the same URL.
    flights: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DocumentCache {
    pub fn new(root: PathBuf, fetcher: Arc<dyn DocumentFetcher>) -> Result<Self> {
        std::fs::create_dir_all(&root)?;
        Self::sweep_stale_tmp(&root)?;
        Ok(Self {
            root,
            fetcher,
            flights: Mutex::new(HashMap::new()),
        })
    }

    /// Remove temp files orphaned by a fetch cancelled between the write
    /// and the rename. Safe at construction: no rename can be in flight
    /// before the cache exists.
    fn sweep_stale_tmp(root: &std::path::Path) -> Result<()> {
        for entry in std::fs::read_dir(root)? {
            let entry = entry?;
            let name = entry.file_name();
            if name.to_string_lossy().starts_with(".tmp-") {
                tracing::debug!(file = %name.to_string_lossy(), "removing stale temp file");
                std::fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }

    /// Return the cached document for `url`, downloading and storing it
    /// on a miss. Repeated calls for the same URL are idempotent; the
    /// `kind` recorded by the first successful fetch wins, and a
    /// conflicting `kind` on a later hit is logged and ignored.
    pub async fn fetch(&self, url: &str, kind: DocumentKind) -> Result<SourceDocument> {
        let url = url.trim();
        let key = content_key(url);

        if let Some(doc) = self.load(&key).await? {
            tracing::debug!(url, key = %key, "document cache hit");
            self.warn_on_kind_mismatch(&doc, kind);
            return Ok(doc);
        }

        let gate = {
            let mut flights = self.flights.lock().await;
            flights
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _guard = gate.lock().await;

        // A concurrent fetch may have completed while we waited.
        if let Some(doc) = self.load(&key).await? {
            self.release_flight(&key).await;
            self.warn_on_kind_mismatch(&doc, kind);
            return Ok(doc);
        }

        let outcome = self.download_and_store(url, &key, kind).await;
        self.release_flight(&key).await;
        outcome
    }

    async fn download_and_store(
        &self,
        url: &str,
        key: &str,
        kind: DocumentKind,
    ) -> Result<SourceDocument> {
        let bytes = self.fetcher.fetch(url).await?;

        if bytes.is_empty() {
            return Err(ForecastError::UnsupportedFormat {
                url: url.to_string(),
                detail: "empty payload".to_string(),
            });
        }
        if extract::classify_layout(&bytes).is_none() {
            return Err(ForecastError::UnsupportedFormat {
                url: url.to_string(),
                detail: "payload is neither PDF, HTML nor text".to_string(),
            });
        }

        let fetched_at = Utc::now();
        let meta = CacheMeta {
            url: url.to_string(),
            kind,
            fetched_at,
            size_bytes: bytes.len(),
        };

        self.write_atomic(&self.bin_path(key), &bytes).await?;
        self.write_atomic(&self.meta_path(key), &serde_json::to_vec_pretty(&meta)?)
            .await?;

        tracing::info!(url, key, size = bytes.len(), "document cached");

        Ok(SourceDocument {
            key: key.to_string(),
            url: url.to_string(),
            kind,
            bytes,
            fetched_at,
        })
    }

    /// A cache entry is only visible once both its payload and metadata
    /// files exist; metadata is written last.
    async fn load(&self, key: &str) -> Result<Option<SourceDocument>> {
        let meta_path = self.meta_path(key);
        let meta_bytes = match tokio::fs::read(&meta_path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let meta: CacheMeta = serde_json::from_slice(&meta_bytes)?;

        let bytes = match tokio::fs::read(self.bin_path(key)).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(Some(SourceDocument {
            key: key.to_string(),
            url: meta.url,
            kind: meta.kind,
            bytes,
            fetched_at: meta.fetched_at,
        }))
    }

    async fn write_atomic(&self, path: &std::path::Path, bytes: &[u8]) -> Result<()> {
        let tmp = self
            .root
            .join(format!(".tmp-{}", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    fn warn_on_kind_mismatch(&self, doc: &SourceDocument, requested: DocumentKind) {
        if doc.kind != requested {
            tracing::warn!(
                url = %doc.url,
                stored = doc.kind.as_str(),
                requested = requested.as_str(),
                "cached document kind differs from the requested kind; keeping stored"
            );
        }
    }

    async fn release_flight(&self, key: &str) {
        self.flights.lock().await.remove(key);
    }

    fn bin_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.bin"))
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}
