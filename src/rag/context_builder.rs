//! Budgeted context assembly.
//!
//! Retrieved chunks are concatenated in relevance order under a hard
//! character budget. Overlapping neighbors from the same document are
//! deduplicated by offset range, and a chunk that would overflow the
//! budget is omitted entirely so the generator never sees a span cut
//! mid-sentence.

use serde::{Deserialize, Serialize};

use crate::rag::index::ScoredChunk;

/// Where an included chunk came from, for auditability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub doc_url: String,
    pub doc_key: String,
    pub chunk_index: usize,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Default)]
pub struct AssembledContext {
    pub text: String,
    pub provenance: Vec<Provenance>,
}

pub struct ContextBuilder {
    max_context_length: usize,
}

impl ContextBuilder {
    pub fn new(max_context_length: usize) -> Self {
        Self { max_context_length }
    }

    /// Assemble a prompt context from ranked chunks.
    ///
    /// Assembly stops at the first chunk that would exceed the budget,
    /// keeping the included set an exact relevance-order prefix of the
    /// deduplicated ranking.
    pub fn assemble(&self, results: &[ScoredChunk]) -> AssembledContext {
        let mut context = AssembledContext::default();
        let mut used = 0usize;

        for scored in results {
            let chunk = &scored.chunk;

            let duplicate = context.provenance.iter().any(|p| {
                p.doc_key == chunk.doc_key && p.start < chunk.end && chunk.start < p.end
            });
            if duplicate {
                continue;
            }

            let citation = format!(
                "[{}] (source: {}, relevance: {:.2})\n{}\n\n",
                context.provenance.len() + 1,
                chunk.doc_url,
                scored.score,
                chunk.text
            );
            let cost = citation.chars().count();
            if used + cost > self.max_context_length {
                break;
            }

            context.text.push_str(&citation);
            context.provenance.push(Provenance {
                doc_url: chunk.doc_url.clone(),
                doc_key: chunk.doc_key.clone(),
                chunk_index: chunk.index,
                start: chunk.start,
                end: chunk.end,
            });
            used += cost;
        }

        context.text = context.text.trim_end().to_string();
        context
    }
}
