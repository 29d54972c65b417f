//! PDF text extraction.

use fintrack_core::error::ExtractionError;
use fintrack_core::extractor::DocumentExtractor;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Extracts text from PDF bytes with `pdf-extract`.
///
/// The parser is known to panic on some malformed inputs; panics are caught
/// and reported as [`ExtractionError::Parse`].
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentExtractor for PdfExtractor {
    fn name(&self) -> &str {
        "pdf"
    }

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError> {
        if bytes.is_empty() {
            return Err(ExtractionError::Parse("empty file".into()));
        }

        let raw = catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes)))
            .map_err(|_| ExtractionError::Parse("PDF parser panicked".into()))?
            .map_err(|e| ExtractionError::Parse(format!("PDF parse error: {e}")))?;

        let text = normalize_whitespace(&raw);
        if text.is_empty() {
            return Err(ExtractionError::Empty);
        }
        Ok(text)
    }
}

/// Collapse every run of whitespace (line breaks included) to one space and trim.
pub fn normalize_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
