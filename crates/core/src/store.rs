//! ChatStore trait — persistence contract for chats and document uploads.
//!
//! The store owns the canonical [`Chat`] record. From the pipeline's point of
//! view the message log is append-only: the only ways messages leave a chat
//! are whole-chat deletion, and the only way they enter is
//! [`ChatStore::append_messages`], which is a compare-and-swap on the chat's
//! revision.
//!
//! Document state (`pdf_text` and the upload ledger) is written independently
//! of the message log and does not bump the revision.

use async_trait::async_trait;
use crate::error::StoreError;
use crate::message::{Chat, ChatId, DocumentUpload, EncryptedBlob, Message};

/// The core ChatStore trait.
///
/// Implementations: SQLite, in-memory (for testing and ephemeral runs).
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Insert a new chat.
    async fn create_chat(&self, chat: Chat) -> Result<(), StoreError>;

    /// All chats of a user, newest first.
    async fn list_chats(&self, uid: &str) -> Result<Vec<Chat>, StoreError>;

    /// Load a chat with its full message log.
    async fn get_chat(&self, uid: &str, chat_id: &ChatId) -> Result<Option<Chat>, StoreError>;

    /// Replace the chat's stored document ciphertext.
    ///
    /// Fails with [`StoreError::ChatNotFound`] if the chat does not exist.
    async fn set_document(
        &self,
        uid: &str,
        chat_id: &ChatId,
        blob: &EncryptedBlob,
    ) -> Result<(), StoreError>;

    /// Append messages to the log, optionally retitling the chat in the same commit.
    ///
    /// Succeeds only if the chat's revision still equals `expected_revision`;
    /// returns the updated chat with its revision incremented by one.
    async fn append_messages(
        &self,
        uid: &str,
        chat_id: &ChatId,
        expected_revision: u64,
        messages: &[Message],
        title: Option<&str>,
    ) -> Result<Chat, StoreError>;

    /// Set a chat's title. Returns `false` if the chat does not exist.
    async fn rename_chat(&self, uid: &str, chat_id: &ChatId, title: &str) -> Result<bool, StoreError>;

    /// Delete a chat, its messages and its upload record. Returns `false` if it did not exist.
    async fn delete_chat(&self, uid: &str, chat_id: &ChatId) -> Result<bool, StoreError>;

    /// Insert or replace the upload ledger record for a chat.
    async fn put_upload(&self, upload: DocumentUpload) -> Result<(), StoreError>;

    /// Latest upload ledger record for a chat.
    async fn get_upload(&self, chat_id: &ChatId) -> Result<Option<DocumentUpload>, StoreError>;
}
