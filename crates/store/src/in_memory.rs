//! In-memory chat store — useful for testing and ephemeral runs.

use async_trait::async_trait;
use fintrack_core::error::StoreError;
use fintrack_core::message::{Chat, ChatId, DocumentUpload, EncryptedBlob, Message};
use fintrack_core::store::ChatStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type ChatKey = (String, ChatId);

#[derive(Default)]
struct State {
    chats: HashMap<ChatKey, Chat>,
    uploads: HashMap<ChatId, DocumentUpload>,
}

/// Keeps every chat in a map behind one lock. Nothing survives a restart.
pub struct InMemoryChatStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
        }
    }
}

impl Default for InMemoryChatStore {
    fn default() -> Self {
        Self::new()
    }
}

fn key(uid: &str, chat_id: &ChatId) -> ChatKey {
    (uid.to_string(), chat_id.clone())
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn create_chat(&self, chat: Chat) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let k = key(&chat.uid, &chat.id);
        if state.chats.contains_key(&k) {
            return Err(StoreError::Storage(format!("Chat {} already exists", chat.id)));
        }
        state.chats.insert(k, chat);
        Ok(())
    }

    async fn list_chats(&self, uid: &str) -> Result<Vec<Chat>, StoreError> {
        let state = self.state.read().await;
        let mut chats: Vec<Chat> = state
            .chats
            .values()
            .filter(|c| c.uid == uid)
            .cloned()
            .collect();
        chats.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(chats)
    }

    async fn get_chat(&self, uid: &str, chat_id: &ChatId) -> Result<Option<Chat>, StoreError> {
        Ok(self.state.read().await.chats.get(&key(uid, chat_id)).cloned())
    }

    async fn set_document(
        &self,
        uid: &str,
        chat_id: &ChatId,
        blob: &EncryptedBlob,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let chat = state
            .chats
            .get_mut(&key(uid, chat_id))
            .ok_or_else(|| StoreError::ChatNotFound(chat_id.to_string()))?;
        chat.pdf_text = Some(blob.clone());
        Ok(())
    }

    async fn append_messages(
        &self,
        uid: &str,
        chat_id: &ChatId,
        expected_revision: u64,
        messages: &[Message],
        title: Option<&str>,
    ) -> Result<Chat, StoreError> {
        let mut state = self.state.write().await;
        let chat = state
            .chats
            .get_mut(&key(uid, chat_id))
            .ok_or_else(|| StoreError::ChatNotFound(chat_id.to_string()))?;

        if chat.revision != expected_revision {
            return Err(StoreError::RevisionConflict {
                chat_id: chat_id.to_string(),
                expected: expected_revision,
                found: chat.revision,
            });
        }

        chat.messages.extend_from_slice(messages);
        if let Some(title) = title {
            chat.title = title.to_string();
        }
        chat.revision += 1;
        Ok(chat.clone())
    }

    async fn rename_chat(&self, uid: &str, chat_id: &ChatId, title: &str) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        match state.chats.get_mut(&key(uid, chat_id)) {
            Some(chat) => {
                chat.title = title.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_chat(&self, uid: &str, chat_id: &ChatId) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let removed = state.chats.remove(&key(uid, chat_id)).is_some();
        if removed {
            state.uploads.remove(chat_id);
        }
        Ok(removed)
    }

    async fn put_upload(&self, upload: DocumentUpload) -> Result<(), StoreError> {
        self.state
            .write()
            .await
            .uploads
            .insert(upload.chat_id.clone(), upload);
        Ok(())
    }

    async fn get_upload(&self, chat_id: &ChatId) -> Result<Option<DocumentUpload>, StoreError> {
        Ok(self.state.read().await.uploads.get(chat_id).cloned())
    }
}
