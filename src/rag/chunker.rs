//! Deterministic overlapping-window chunking.
//!
//! Chunks are fixed stride windows over the extracted text, measured in
//! characters. Re-chunking the same text with the same policy always
//! yields identical chunks, and consecutive chunks share exactly
//! `overlap` characters so retrieval never severs a span at a hard
//! boundary.

use serde::{Deserialize, Serialize};

use crate::cache::DocumentKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub doc_key: String,
    pub doc_url: String,
    pub kind: DocumentKind,
    /// Sequence index within the source document.
    pub index: usize,
    pub text: String,
    /// Char offset range into the extracted text.
    pub start: usize,
    pub end: usize,
    pub section: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPolicy {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self {
            chunk_size: 900,
            overlap: 150,
        }
    }
}

impl ChunkPolicy {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
        }
    }
}

/// Split extracted text into overlapping chunks.
///
/// A document shorter than `chunk_size` yields exactly one chunk. A
/// trailing window that would add fewer than `overlap` new characters is
/// merged into the previous chunk instead of being emitted as a
/// degenerate tail; that previous chunk may then exceed `chunk_size` by
/// less than `overlap`.
pub fn split(
    text: &str,
    policy: ChunkPolicy,
    doc_key: &str,
    doc_url: &str,
    kind: DocumentKind,
) -> Vec<Chunk> {
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    if total == 0 {
        return Vec::new();
    }

    let chunk_size = policy.chunk_size.max(1);
    let overlap = policy.overlap.min(chunk_size.saturating_sub(1));
    let step = chunk_size - overlap;

    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(total);
        spans.push((start, end));
        if end == total {
            break;
        }
        start += step;
    }

    // Merge a degenerate tail into its predecessor.
    if spans.len() >= 2 {
        let last_new = spans[spans.len() - 1].1 - spans[spans.len() - 2].1;
        if last_new < overlap.max(1) {
            spans.pop();
            if let Some(prev) = spans.last_mut() {
                prev.1 = total;
            }
        }
    }

    spans
        .into_iter()
        .enumerate()
        .map(|(index, (start, end))| Chunk {
            doc_key: doc_key.to_string(),
            doc_url: doc_url.to_string(),
            kind,
            index,
            text: chars[start..end].iter().collect(),
            start,
            end,
            section: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: ChunkPolicy = ChunkPolicy {
        chunk_size: 40,
        overlap: 10,
    };

    fn chunks_of(text: &str, policy: ChunkPolicy) -> Vec<Chunk> {
        split(
            text,
            policy,
            "key",
            "https://example.com/doc",
            DocumentKind::FinancialReport,
        )
    }

    fn sample(len: usize) -> String {
        "abcdefghij".chars().cycle().take(len).collect()
    }

    #[test]
    fn short_document_yields_one_chunk() {
        let chunks = chunks_of("short text", POLICY);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "short text");
        assert_eq!((chunks[0].start, chunks[0].end), (0, 10));
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunks_of("", POLICY).is_empty());
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = sample(500);
        let a = chunks_of(&text, POLICY);
        let b = chunks_of(&text, POLICY);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.text, y.text);
            assert_eq!((x.start, x.end), (y.start, y.end));
            assert_eq!(x.index, y.index);
        }
    }

    #[test]
    fn consecutive_chunks_share_exact_overlap() {
        let text = sample(500);
        let chunks = chunks_of(&text, POLICY);
        assert!(chunks.len() > 2);

        for pair in chunks.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert_eq!(a.end - b.start, POLICY.overlap);
            let a_tail: String = a.text.chars().skip(a.text.chars().count() - POLICY.overlap).collect();
            let b_head: String = b.text.chars().take(POLICY.overlap).collect();
            assert_eq!(a_tail, b_head);
        }
    }

    #[test]
    fn concatenating_without_overlaps_reconstructs_text() {
        for len in [40, 95, 100, 137, 400, 401] {
            let text = sample(len);
            let chunks = chunks_of(&text, POLICY);

            let mut rebuilt = String::new();
            for (i, chunk) in chunks.iter().enumerate() {
                if i == 0 {
                    rebuilt.push_str(&chunk.text);
                } else {
                    rebuilt.extend(chunk.text.chars().skip(POLICY.overlap));
                }
            }
            assert_eq!(rebuilt, text, "coverage broken for len {len}");
        }
    }

    #[test]
    fn degenerate_tail_is_merged_into_previous_chunk() {
        // stride 30; a 75-char text would leave a 15-char final window
        // adding only 5 new chars, which is below the 10-char overlap.
        let text = sample(75);
        let chunks = chunks_of(&text, POLICY);
        assert_eq!(chunks.len(), 2);
        let last = chunks.last().expect("non-empty");
        assert_eq!(last.end, 75);
        assert!(last.text.chars().count() <= POLICY.chunk_size + POLICY.overlap);
    }

    #[test]
    fn source_order_is_preserved() {
        let chunks = chunks_of(&sample(300), POLICY);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
        assert!(chunks.windows(2).all(|w| w[0].start < w[1].start));
    }
}
