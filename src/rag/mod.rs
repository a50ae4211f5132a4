//! The RAG pipeline: chunking, embedding, the request-scoped vector
//! index, top-K retrieval and context assembly.

pub mod chunker;
pub mod context_builder;
pub mod embedder;
pub mod index;
pub mod retriever;

pub use chunker::{Chunk, ChunkPolicy};
pub use context_builder::{AssembledContext, ContextBuilder, Provenance};
pub use embedder::Embedder;
pub use index::{Metric, ScoredChunk, VectorIndex};
pub use retriever::Retriever;
