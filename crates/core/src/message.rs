//! Message and Chat domain types.
//!
//! These are the core value objects that flow through the pipeline:
//! User sends a message → Assembler frames it → Provider answers → Store appends both.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a chat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub String);

impl ChatId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ChatId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ciphertext of an extracted document, encoded as `<hex iv>:<hex ciphertext>`.
///
/// Opaque to everything except the cipher.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedBlob(pub String);

impl EncryptedBlob {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for EncryptedBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncryptedBlob({} bytes)", self.0.len())
    }
}

/// The role of a message sender in a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// Synthesized context, never persisted
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message in a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// When the message was accepted
    pub timestamp: DateTime<Utc>,

    /// Set on the user message that carried an upload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_attached: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl Message {
    /// Create a message with an explicit role.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            file_attached: None,
            file_type: None,
            file_name: None,
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Mark this message as carrying an uploaded file.
    pub fn with_attachment(mut self, file_type: impl Into<String>, file_name: impl Into<String>) -> Self {
        self.file_attached = Some(true);
        self.file_type = Some(file_type.into());
        self.file_name = Some(file_name.into());
        self
    }

    pub fn has_attachment(&self) -> bool {
        self.file_attached.unwrap_or(false)
    }
}

/// A persisted conversation thread owned by one user.
///
/// `messages` only ever grows; `revision` counts committed appends and is
/// what concurrent writers compare against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    #[serde(rename = "chatId")]
    pub id: ChatId,

    /// Owning user
    pub uid: String,

    /// Display title (user-set or model-named)
    pub title: String,

    pub created_at: DateTime<Utc>,

    /// Ordered, append-only message log
    #[serde(default)]
    pub messages: Vec<Message>,

    /// Ciphertext of the most recently uploaded document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_text: Option<EncryptedBlob>,

    #[serde(default)]
    pub revision: u64,
}

impl Chat {
    /// Create a new empty chat for a user.
    pub fn new(uid: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: ChatId::new(),
            uid: uid.into(),
            title: title.into(),
            created_at: Utc::now(),
            messages: Vec::new(),
            pdf_text: None,
            revision: 0,
        }
    }

    pub fn has_document(&self) -> bool {
        self.pdf_text.is_some()
    }
}

/// Side-ledger record of the latest encrypted upload for a chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentUpload {
    pub chat_id: ChatId,
    pub uid: String,
    pub encrypted_text: EncryptedBlob,
    pub created_at: DateTime<Utc>,
}
