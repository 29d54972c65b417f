//! DocumentExtractor trait — binary document in, normalized plain text out.

use crate::error::ExtractionError;

/// MIME type accepted for statement uploads.
pub const PDF_MIME: &str = "application/pdf";

/// A file received alongside a request.
#[derive(Clone)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, content_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            bytes,
        }
    }

    /// Declared as `application/pdf`, or undeclared/generic with a `.pdf` name.
    pub fn is_pdf(&self) -> bool {
        match self.content_type.as_deref() {
            Some(PDF_MIME) => true,
            None | Some("application/octet-stream") => {
                self.file_name.to_ascii_lowercase().ends_with(".pdf")
            }
            Some(_) => false,
        }
    }
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Converts a binary document into whitespace-normalized plain text.
///
/// Implementations are blocking; callers run them off the async executor.
pub trait DocumentExtractor: Send + Sync {
    /// A short name for logs (e.g., "pdf").
    fn name(&self) -> &str;

    fn extract(&self, bytes: &[u8]) -> Result<String, ExtractionError>;
}
