//! The chat service — orchestrates one request end to end.
//!
//! A send runs these steps and stops at the first failure:
//! 1. validate the request and load the chat
//! 2. extract, encrypt and persist an uploaded statement (its own commit)
//! 3. assemble the model context
//! 4. call the model, naming the chat on its first turn
//! 5. append the user and assistant messages in one revision-checked commit
//!
//! Every mutating operation on a chat holds that chat's lock from the
//! initial read to the final write.

use std::sync::Arc;
use chrono::Utc;
use fintrack_core::error::{ChatError, ExtractionError, Result};
use fintrack_core::extractor::{Attachment, DocumentExtractor};
use fintrack_core::message::{Chat, ChatId, DocumentUpload, EncryptedBlob, Message, Role};
use fintrack_core::store::ChatStore;
use fintrack_security::Cipher;
use tracing::{debug, info, warn};

use crate::assembler::{AssemblyInput, assemble};
use crate::locks::ChatLocks;
use crate::model_gateway::ModelGateway;
use crate::naming::extract_chat_name;

pub const DEFAULT_CHAT_TITLE: &str = "New Chat";

/// An inbound chat message as received from a client.
#[derive(Debug, Default, Clone)]
pub struct SendMessage {
    pub role: Option<String>,
    pub content: Option<String>,
    pub attachment: Option<Attachment>,
}

pub struct ChatService {
    store: Arc<dyn ChatStore>,
    cipher: Arc<Cipher>,
    extractor: Arc<dyn DocumentExtractor>,
    gateway: ModelGateway,
    locks: ChatLocks,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn ChatStore>,
        cipher: Cipher,
        extractor: Arc<dyn DocumentExtractor>,
        gateway: ModelGateway,
    ) -> Self {
        Self {
            store,
            cipher: Arc::new(cipher),
            extractor,
            gateway,
            locks: ChatLocks::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn ChatStore> {
        &self.store
    }

    /// Create an empty chat. A blank title becomes "New Chat".
    pub async fn create_chat(&self, uid: &str, title: Option<&str>) -> Result<ChatId> {
        let uid = require(Some(uid), "uid")?;
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_CHAT_TITLE);

        let chat = Chat::new(uid, title);
        let id = chat.id.clone();
        self.store.create_chat(chat).await?;

        info!(chat_id = %id, uid = %uid, "Chat created");
        Ok(id)
    }

    pub async fn list_chats(&self, uid: &str) -> Result<Vec<Chat>> {
        Ok(self.store.list_chats(uid).await?)
    }

    pub async fn get_chat(&self, uid: &str, chat_id: &ChatId) -> Result<Chat> {
        self.store
            .get_chat(uid, chat_id)
            .await?
            .ok_or_else(|| chat_not_found(chat_id))
    }

    /// Run one conversational turn and return the chat's full message log.
    pub async fn send_message(
        &self,
        uid: &str,
        chat_id: &ChatId,
        request: SendMessage,
    ) -> Result<Vec<Message>> {
        let role = parse_role(request.role.as_deref())?;
        require(request.content.as_deref(), "content")?;
        let content = request.content.unwrap_or_default();
        if let Some(attachment) = &request.attachment {
            ensure_pdf(attachment)?;
        }

        let _guard = self.locks.acquire(uid, chat_id.as_str()).await;
        let chat = self.get_chat(uid, chat_id).await?;
        let expected_revision = chat.revision;

        let mut inbound = Message::new(role, content);
        let new_document = match request.attachment {
            Some(attachment) => {
                inbound = inbound.with_attachment("pdf", attachment.file_name.clone());
                let text = self.extract(attachment).await?;
                let blob = self.cipher.encrypt(&text)?;
                self.persist_document(uid, chat_id, &blob).await?;
                Some(text)
            }
            None => None,
        };

        let context = assemble(
            AssemblyInput {
                history: &chat.messages,
                stored_document: chat.pdf_text.as_ref(),
                new_document: new_document.as_deref(),
                inbound: inbound.clone(),
            },
            &self.cipher,
        )?;

        debug!(
            chat_id = %chat_id,
            first_turn = context.first_turn,
            document_context = context.system.is_some(),
            "Context assembled"
        );

        let reply = self
            .gateway
            .complete(&context.payload, context.first_turn)
            .await?;

        let (title, reply) = match context.first_turn.then(|| extract_chat_name(&reply)).flatten() {
            Some(name) => (Some(name.title), name.stripped),
            None => (None, reply),
        };

        let committed = self
            .store
            .append_messages(
                uid,
                chat_id,
                expected_revision,
                &[inbound, Message::assistant(reply)],
                title.as_deref(),
            )
            .await?;

        info!(
            chat_id = %chat_id,
            uid = %uid,
            first_turn = context.first_turn,
            renamed = title.is_some(),
            messages = committed.messages.len(),
            "Turn committed"
        );
        Ok(committed.messages)
    }

    /// Store a statement for a chat without sending a message.
    pub async fn upload_document(
        &self,
        uid: &str,
        chat_id: &ChatId,
        attachment: Attachment,
    ) -> Result<()> {
        let uid = require(Some(uid), "uid")?;
        require(Some(chat_id.as_str()), "chatId")?;
        ensure_pdf(&attachment)?;

        let _guard = self.locks.acquire(uid, chat_id.as_str()).await;
        self.get_chat(uid, chat_id).await?;

        let text = self.extract(attachment).await?;
        let blob = self.cipher.encrypt(&text)?;
        self.persist_document(uid, chat_id, &blob).await?;

        info!(chat_id = %chat_id, uid = %uid, "Statement stored");
        Ok(())
    }

    /// Ask the model for insights on the chat's latest uploaded statement.
    pub async fn generate_insight(&self, chat_id: &ChatId) -> Result<String> {
        require(Some(chat_id.as_str()), "chatId")?;
        let upload = self
            .store
            .get_upload(chat_id)
            .await?
            .ok_or_else(|| ChatError::NotFound(format!("no uploaded statement for chat {chat_id}")))?;

        let text = self.cipher.decrypt(&upload.encrypted_text)?;
        Ok(self.gateway.insight(&text).await?)
    }

    /// Delete a chat and its upload record. Deleting a missing chat succeeds.
    pub async fn delete_chat(&self, uid: &str, chat_id: &ChatId) -> Result<()> {
        let _guard = self.locks.acquire(uid, chat_id.as_str()).await;
        let existed = self.store.delete_chat(uid, chat_id).await?;
        if existed {
            info!(chat_id = %chat_id, uid = %uid, "Chat deleted");
        } else {
            debug!(chat_id = %chat_id, uid = %uid, "Delete of missing chat acknowledged");
        }
        Ok(())
    }

    pub async fn rename_chat(&self, uid: &str, chat_id: &ChatId, title: Option<&str>) -> Result<()> {
        let title = require(title, "title")?;

        let _guard = self.locks.acquire(uid, chat_id.as_str()).await;
        if !self.store.rename_chat(uid, chat_id, title).await? {
            return Err(chat_not_found(chat_id));
        }
        Ok(())
    }

    pub async fn summarize_chat(&self, uid: &str, chat_id: &ChatId) -> Result<String> {
        let chat = self.get_chat(uid, chat_id).await?;
        if chat.messages.is_empty() {
            return Err(ChatError::BadRequest("Chat has no messages to summarize".into()));
        }
        Ok(self.gateway.summarize(&chat.messages).await?)
    }

    async fn extract(&self, attachment: Attachment) -> Result<String> {
        let extractor = self.extractor.clone();
        let bytes = attachment.bytes;
        let size = bytes.len();

        let text = tokio::task::spawn_blocking(move || extractor.extract(&bytes))
            .await
            .map_err(|e| {
                warn!(error = %e, "Extraction task aborted");
                ExtractionError::Parse(format!("extraction task failed: {e}"))
            })??;

        debug!(bytes = size, chars = text.len(), "Statement extracted");
        Ok(text)
    }

    async fn persist_document(&self, uid: &str, chat_id: &ChatId, blob: &EncryptedBlob) -> Result<()> {
        self.store.set_document(uid, chat_id, blob).await?;
        self.store
            .put_upload(DocumentUpload {
                chat_id: chat_id.clone(),
                uid: uid.to_string(),
                encrypted_text: blob.clone(),
                created_at: Utc::now(),
            })
            .await?;
        Ok(())
    }
}

fn require<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ChatError::BadRequest(format!("Missing {field}"))),
    }
}

fn parse_role(role: Option<&str>) -> Result<Role> {
    let role = require(role, "role")?
        .parse::<Role>()
        .map_err(ChatError::BadRequest)?;
    if role == Role::System {
        return Err(ChatError::BadRequest("role 'system' is reserved".into()));
    }
    Ok(role)
}

fn ensure_pdf(attachment: &Attachment) -> Result<()> {
    if attachment.is_pdf() {
        Ok(())
    } else {
        Err(ChatError::BadRequest(format!(
            "Only PDF files are supported (got {})",
            attachment
                .content_type
                .as_deref()
                .unwrap_or(attachment.file_name.as_str())
        )))
    }
}

fn chat_not_found(chat_id: &ChatId) -> ChatError {
    ChatError::NotFound(format!("chat {chat_id}"))
}
