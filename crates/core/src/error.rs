//! Error types for the FinTrack domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`ChatError`] is the
//! request-level taxonomy every pipeline operation reports.

use thiserror::Error;

/// The request-level error type for all chat pipeline operations.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Missing or malformed request fields.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The chat or document does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Another writer committed to the same chat first.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Cipher error: {0}")]
    Cipher(#[from] CipherError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] ProviderError),

    #[error("Storage error: {0}")]
    Storage(String),

    /// Fatal, startup-only.
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl From<StoreError> for ChatError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ChatNotFound(id) => ChatError::NotFound(format!("chat {id}")),
            StoreError::RevisionConflict { chat_id, .. } => {
                ChatError::Conflict(format!("chat {chat_id} was modified concurrently"))
            }
            other => ChatError::Storage(other.to_string()),
        }
    }
}

/// Result type alias using [`ChatError`].
pub type Result<T> = std::result::Result<T, ChatError>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider returned an empty response")]
    EmptyResponse,

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Chat not found: {0}")]
    ChatNotFound(String),

    #[error("Revision conflict on chat {chat_id}: expected {expected}, found {found}")]
    RevisionConflict {
        chat_id: String,
        expected: u64,
        found: u64,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CipherError {
    /// Plaintext was empty.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Malformed blob, corrupt padding, or mismatched secret.
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid secret key: {0}")]
    InvalidKey(String),
}

#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    #[error("Failed to parse document: {0}")]
    Parse(String),

    #[error("Document contains no extractable text")]
    Empty,
}
