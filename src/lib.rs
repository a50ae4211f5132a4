//! Retrieval-augmented forecasting core.
//!
//! Ingests quarterly financial reports and earnings-call transcripts,
//! grounds an LLM in retrieved document context and produces a structured
//! qualitative next-quarter forecast. The HTTP layer, durable audit storage
//! and the inference engine itself are external collaborators reached
//! through the `DocumentFetcher`, `AuditSink` and `LlmProvider` traits.

pub mod agent;
pub mod cache;
pub mod core;
pub mod extract;
pub mod llm;
pub mod logging;
pub mod rag;
pub mod tools;

pub use crate::core::config::Settings;
pub use crate::core::errors::{ForecastError, Result};
pub use agent::{ForecastAgent, ForecastRequest, ForecastResponse};
