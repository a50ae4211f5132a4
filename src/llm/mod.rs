//! Black-box generation and embedding capability.
//!
//! The core never manages model loading or hardware placement; it talks
//! to an OpenAI-compatible server (Ollama, LM Studio, vLLM) through the
//! `LlmProvider` trait.

mod openai;
mod provider;
mod types;

pub use openai::OpenAiCompatProvider;
pub use provider::LlmProvider;
pub use types::{ChatMessage, ChatOptions};
