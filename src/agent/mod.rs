//! Forecast agent orchestration.
//!
//! Drives one request through the pipeline state machine:
//! `Received -> DocumentsReady -> Indexed -> Retrieved -> ContextBuilt ->
//! Generated -> Done`, with `Failed` reachable from every step. Document
//! fetches fan out concurrently with a bounded width and are collected
//! into tagged per-URL outcomes before the join point, so the partial
//! failure decision is made once, from complete information.

mod audit;
mod prompt;
#[cfg(test)]
mod tests;
mod types;

pub use audit::{AuditRecord, AuditSink, TracingAuditSink};
pub use types::{
    Confidence, FinancialTrends, ForecastRequest, ForecastResponse, ModelForecast,
};

use std::sync::Arc;

use futures_util::stream::{self, StreamExt};

use crate::cache::{DocumentCache, DocumentKind, SourceDocument};
use crate::core::config::Settings;
use crate::core::errors::{ForecastError, Result};
use crate::extract;
use crate::llm::{ChatMessage, ChatOptions, LlmProvider};
use crate::rag::{chunker, ChunkPolicy, ContextBuilder, Embedder, Metric, Retriever, VectorIndex};
use crate::tools::{self, DocumentMetrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Received,
    DocumentsReady,
    Indexed,
    Retrieved,
    ContextBuilt,
    Generated,
    Done,
    Failed,
}

impl RequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::Received => "received",
            RequestState::DocumentsReady => "documents_ready",
            RequestState::Indexed => "indexed",
            RequestState::Retrieved => "retrieved",
            RequestState::ContextBuilt => "context_built",
            RequestState::Generated => "generated",
            RequestState::Done => "done",
            RequestState::Failed => "failed",
        }
    }
}

/// Tagged result of one document fetch, collected before the join point.
struct FetchOutcome {
    position: usize,
    url: String,
    result: Result<SourceDocument>,
}

pub struct ForecastAgent {
    settings: Settings,
    cache: Arc<DocumentCache>,
    provider: Arc<dyn LlmProvider>,
    embedder: Arc<Embedder>,
    audit: Arc<dyn AuditSink>,
}

impl ForecastAgent {
    pub fn new(
        settings: Settings,
        cache: Arc<DocumentCache>,
        provider: Arc<dyn LlmProvider>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let embedder = Arc::new(Embedder::new(
            provider.clone(),
            settings.llm.embedding_model.clone(),
        ));
        Self {
            settings,
            cache,
            provider,
            embedder,
            audit,
        }
    }

    /// Run one request to a terminal state and emit the audit record.
    pub async fn run(&self, request: ForecastRequest) -> Result<ForecastResponse> {
        let result = self.execute(&request).await;

        let record = AuditRecord {
            request_id: request.id.clone(),
            query: request.query.clone(),
            document_urls: request
                .financial_doc_urls
                .iter()
                .chain(request.transcript_urls.iter())
                .cloned()
                .collect(),
            model_used: self.settings.llm.chat_model.clone(),
            embedding_model: self.settings.llm.embedding_model.clone(),
            outcome: match &result {
                Ok(_) => RequestState::Done.as_str().to_string(),
                Err(_) => RequestState::Failed.as_str().to_string(),
            },
            response: result
                .as_ref()
                .ok()
                .and_then(|r| serde_json::to_value(r).ok()),
            error: result.as_ref().err().map(|e| e.to_string()),
            created_at: chrono::Utc::now(),
        };
        self.audit.record(&record).await;

        result
    }

    async fn execute(&self, request: &ForecastRequest) -> Result<ForecastResponse> {
        self.transition(request, RequestState::Received);

        if request.url_count() == 0 {
            return Err(ForecastError::NoDocumentsAvailable(
                "request carried no document URLs".to_string(),
            ));
        }

        // Received -> DocumentsReady: bounded concurrent fetches.
        let (documents, mut warnings) = self.fetch_documents(request).await?;
        self.transition(request, RequestState::DocumentsReady);

        // DocumentsReady -> Indexed: extract, chunk, embed, index.
        let (index, doc_metrics) = self.build_index(&documents, &mut warnings).await?;
        self.transition(request, RequestState::Indexed);

        // Indexed -> Retrieved.
        let retriever = Retriever::new(self.embedder.clone(), self.settings.rag.top_k);
        let retrieved = retriever.retrieve(&request.query, &index, None).await?;
        self.transition(request, RequestState::Retrieved);

        // Retrieved -> ContextBuilt.
        let max_len = self.settings.rag.max_context_length;
        let context = ContextBuilder::new(max_len).assemble(&retrieved);
        self.transition(request, RequestState::ContextBuilt);

        // ContextBuilt -> Generated, retrying once with a halved budget.
        let metrics_json = serde_json::to_string_pretty(&doc_metrics)?;
        let (raw, context) = match self.chat(&request.query, &metrics_json, &context.text).await {
            Ok(raw) => (raw, context),
            Err(first) => {
                tracing::warn!(
                    request_id = %request.id,
                    error = %first,
                    "generation failed, retrying with halved context"
                );
                let halved = ContextBuilder::new(max_len / 2).assemble(&retrieved);
                let raw = self
                    .chat(&request.query, &metrics_json, &halved.text)
                    .await
                    .map_err(|second| {
                        ForecastError::Generation(format!(
                            "failed after retry with halved context: {second}"
                        ))
                    })?;
                (raw, halved)
            }
        };
        self.transition(request, RequestState::Generated);

        // Generated -> Done: parse, retrying generation once with an
        // explicit reformatting instruction.
        let forecast = match prompt::parse_forecast(&raw) {
            Ok(forecast) => forecast,
            Err(parse_err) => {
                tracing::warn!(
                    request_id = %request.id,
                    error = %parse_err,
                    "generation output failed schema parsing, requesting reformat"
                );
                let retry_raw = self
                    .chat_reformat(&request.query, &metrics_json, &context.text, &raw)
                    .await?;
                prompt::parse_forecast(&retry_raw).map_err(|_| {
                    ForecastError::MalformedOutput(format!(
                        "output failed schema parsing after reformat retry: {parse_err}"
                    ))
                })?
            }
        };

        self.transition(request, RequestState::Done);
        Ok(ForecastResponse::from_model(
            request.id.clone(),
            forecast,
            context.provenance,
            warnings,
            self.settings.llm.chat_model.clone(),
        ))
    }

    /// Fetch every requested URL with bounded fan-out. Proceeds as long
    /// as at least one document survives; failures become warnings.
    async fn fetch_documents(
        &self,
        request: &ForecastRequest,
    ) -> Result<(Vec<SourceDocument>, Vec<String>)> {
        let jobs: Vec<(usize, String, DocumentKind)> = request
            .financial_doc_urls
            .iter()
            .map(|u| (u.clone(), DocumentKind::FinancialReport))
            .chain(
                request
                    .transcript_urls
                    .iter()
                    .map(|u| (u.clone(), DocumentKind::Transcript)),
            )
            .enumerate()
            .map(|(position, (url, kind))| (position, url, kind))
            .collect();

        let mut outcomes: Vec<FetchOutcome> = stream::iter(jobs)
            .map(|(position, url, kind)| {
                let cache = Arc::clone(&self.cache);
                async move {
                    let result = cache.fetch(&url, kind).await;
                    FetchOutcome {
                        position,
                        url,
                        result,
                    }
                }
            })
            .buffer_unordered(self.settings.cache.fetch_concurrency)
            .collect()
            .await;

        // Restore request order so downstream structures are deterministic.
        outcomes.sort_by_key(|o| o.position);

        let mut documents = Vec::new();
        let mut warnings = Vec::new();
        for outcome in outcomes {
            match outcome.result {
                Ok(doc) => documents.push(doc),
                Err(e) => {
                    tracing::warn!(url = %outcome.url, error = %e, "dropping source");
                    warnings.push(format!("{}: {e}", outcome.url));
                }
            }
        }

        if documents.is_empty() {
            return Err(ForecastError::NoDocumentsAvailable(warnings.join("; ")));
        }
        Ok((documents, warnings))
    }

    /// Extract, chunk and embed every surviving document into a fresh
    /// request-scoped index. Extraction failures drop the document with a
    /// warning; an index with nothing left aborts the request.
    async fn build_index(
        &self,
        documents: &[SourceDocument],
        warnings: &mut Vec<String>,
    ) -> Result<(VectorIndex, Vec<DocumentMetrics>)> {
        let policy = ChunkPolicy::new(
            self.settings.rag.chunk_size,
            self.settings.rag.chunk_overlap,
        );
        let mut index = VectorIndex::new(Metric::Cosine);
        let mut doc_metrics = Vec::new();

        for doc in documents {
            let text = match extract::extract_text(doc) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(url = %doc.url, error = %e, "dropping unextractable source");
                    warnings.push(format!("{}: {e}", doc.url));
                    continue;
                }
            };

            if doc.kind == DocumentKind::FinancialReport {
                doc_metrics.push(DocumentMetrics {
                    url: doc.url.clone(),
                    metrics: tools::extract_financial_metrics(&text),
                });
            }

            let chunks = chunker::split(&text, policy, &doc.key, &doc.url, doc.kind);
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed_many(&texts).await?;
            for (chunk, vector) in chunks.into_iter().zip(vectors) {
                index.add(chunk, vector)?;
            }
        }

        if index.is_empty() {
            return Err(ForecastError::NoDocumentsAvailable(format!(
                "no document yielded extractable text: {}",
                warnings.join("; ")
            )));
        }
        index.build();
        Ok((index, doc_metrics))
    }

    async fn chat(&self, query: &str, metrics_json: &str, context: &str) -> Result<String> {
        let messages = vec![
            ChatMessage::system(prompt::SYSTEM_PROMPT),
            ChatMessage::user(prompt::build_user_prompt(query, metrics_json, context)),
        ];
        self.provider
            .chat(&messages, &self.settings.llm.chat_model, &self.chat_options())
            .await
    }

    async fn chat_reformat(
        &self,
        query: &str,
        metrics_json: &str,
        context: &str,
        previous_reply: &str,
    ) -> Result<String> {
        let messages = vec![
            ChatMessage::system(prompt::SYSTEM_PROMPT),
            ChatMessage::user(prompt::build_user_prompt(query, metrics_json, context)),
            ChatMessage {
                role: "assistant".to_string(),
                content: previous_reply.to_string(),
            },
            ChatMessage::user(prompt::REFORMAT_INSTRUCTION),
        ];
        self.provider
            .chat(&messages, &self.settings.llm.chat_model, &self.chat_options())
            .await
    }

    fn chat_options(&self) -> ChatOptions {
        ChatOptions {
            temperature: Some(self.settings.llm.temperature),
            max_tokens: None,
        }
    }

    fn transition(&self, request: &ForecastRequest, state: RequestState) {
        tracing::info!(request_id = %request.id, state = state.as_str(), "state transition");
    }
}
