use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One record per terminal request state, handed to an external sink.
/// Durable storage and querying are the recipient's concern.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub request_id: String,
    pub query: String,
    pub document_urls: Vec<String>,
    pub model_used: String,
    pub embedding_model: String,
    /// "done" or "failed".
    pub outcome: String,
    pub response: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: &AuditRecord);
}

/// Default sink: emits the record as a structured tracing event.
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, record: &AuditRecord) {
        let payload = serde_json::to_string(record).unwrap_or_default();
        tracing::info!(target: "audit", %payload, "forecast audit record");
    }
}
