//! Text extraction from raw document bytes.
//!
//! Layouts form a closed set: PDF (via `pdf-extract`), HTML (tag
//! stripping) and plain text. A byte-sniffing classifier selects the
//! variant; anything unrecognizable is rejected upstream by the cache.
//! A document that classifies but yields no text (e.g. a scanned PDF
//! without a text layer) is an `Extraction` error, never a silent empty
//! result.

mod html;

use crate::cache::SourceDocument;
use crate::core::errors::{ForecastError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentLayout {
    Pdf,
    Html,
    PlainText,
}

/// Sniff the payload layout. Returns `None` for payloads the pipeline
/// cannot handle (the cache maps that to `UnsupportedFormat`).
pub fn classify_layout(bytes: &[u8]) -> Option<DocumentLayout> {
    if bytes.starts_with(b"%PDF-") {
        return Some(DocumentLayout::Pdf);
    }

    let text = std::str::from_utf8(bytes).ok()?;
    let trimmed = text.trim_start();
    if trimmed.is_empty() {
        return None;
    }

    let lower_head: String = trimmed.chars().take(256).collect::<String>().to_lowercase();
    if lower_head.starts_with("<!doctype html")
        || lower_head.starts_with("<html")
        || lower_head.contains("<body")
    {
        return Some(DocumentLayout::Html);
    }

    Some(DocumentLayout::PlainText)
}

/// Extract plain text from a fetched document.
pub fn extract_text(doc: &SourceDocument) -> Result<String> {
    let layout = classify_layout(&doc.bytes).ok_or_else(|| ForecastError::UnsupportedFormat {
        url: doc.url.clone(),
        detail: "payload is neither PDF, HTML nor text".to_string(),
    })?;

    let raw = match layout {
        DocumentLayout::Pdf => pdf_extract::extract_text_from_mem(&doc.bytes)
            .map_err(|e| ForecastError::extraction(&doc.url, e))?,
        DocumentLayout::Html => html::strip_tags(&String::from_utf8_lossy(&doc.bytes)),
        DocumentLayout::PlainText => String::from_utf8_lossy(&doc.bytes).into_owned(),
    };

    let text = clean_text(&raw);
    if text.is_empty() {
        return Err(ForecastError::extraction(&doc.url, "no extractable text"));
    }

    tracing::debug!(url = %doc.url, layout = ?layout, chars = text.chars().count(), "extracted text");
    Ok(text)
}

/// Collapse all whitespace runs to single spaces and trim. Chunk offsets
/// are taken against this normalized form, so it must be deterministic.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Utc;

    use crate::cache::DocumentKind;

    fn doc(bytes: &[u8]) -> SourceDocument {
        SourceDocument {
            key: "k".to_string(),
            url: "https://example.com/doc".to_string(),
            kind: DocumentKind::FinancialReport,
            bytes: bytes.to_vec(),
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn classifies_pdf_html_and_text() {
        assert_eq!(classify_layout(b"%PDF-1.7 ..."), Some(DocumentLayout::Pdf));
        assert_eq!(
            classify_layout(b"<!DOCTYPE html><html></html>"),
            Some(DocumentLayout::Html)
        );
        assert_eq!(
            classify_layout(b"Total revenue was Rs 60,000 crore."),
            Some(DocumentLayout::PlainText)
        );
        assert_eq!(classify_layout(&[0xff, 0xfe, 0x00]), None);
        assert_eq!(classify_layout(b"   \n\t  "), None);
    }

    #[test]
    fn plain_text_is_normalized() {
        let text = extract_text(&doc(b"Revenue  grew\n\n 8%  \t YoY")).expect("extract");
        assert_eq!(text, "Revenue grew 8% YoY");
    }

    #[test]
    fn html_extraction_strips_markup() {
        let text = extract_text(&doc(
            b"<html><body><p>Operating margin was 24%.</p></body></html>",
        ))
        .expect("extract");
        assert_eq!(text, "Operating margin was 24%.");
    }

    #[test]
    fn whitespace_only_document_is_an_extraction_error() {
        let err = extract_text(&doc(b"<html><body>   </body></html>"))
            .expect_err("no text must fail");
        assert!(matches!(err, ForecastError::Extraction { .. }));
    }

    #[test]
    fn clean_text_is_idempotent() {
        let once = clean_text("a  b\nc");
        assert_eq!(clean_text(&once), once);
    }
}
