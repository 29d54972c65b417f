//! Context assembly: the exact message list the model sees for one turn.
//!
//! Pure and deterministic. Given the chat's log, its stored document (if any),
//! a freshly uploaded document (if any) and the inbound message, produce:
//! - at most one synthesized `system` message carrying document context,
//! - the log extended with the inbound message,
//! - whether this is the chat's first turn.
//!
//! A fresh upload always wins over the stored blob, so the model never sees
//! two documents in one request.

use fintrack_core::error::CipherError;
use fintrack_core::message::{EncryptedBlob, Message};
use fintrack_security::Cipher;

/// Prefix for a document uploaded with the current message.
pub const UPLOADED_DOCUMENT_PREFIX: &str = "This is the content extracted from the uploaded PDF:\n";

/// Prefix for the chat's stored document, repeated on every later turn.
pub const STORED_DOCUMENT_PREFIX: &str =
    "Here is the user's bank statement data to assist with queries:\n";

pub struct AssemblyInput<'a> {
    /// The chat's durable log before this turn.
    pub history: &'a [Message],
    /// The chat's stored document ciphertext.
    pub stored_document: Option<&'a EncryptedBlob>,
    /// Plain text of a document uploaded with this message.
    pub new_document: Option<&'a str>,
    pub inbound: Message,
}

#[derive(Debug, Clone)]
pub struct AssembledContext {
    /// Synthesized document context. Never persisted.
    pub system: Option<Message>,
    /// `history ++ [inbound]`
    pub updated_messages: Vec<Message>,
    /// `[system?] ++ updated_messages`, in the order sent to the model.
    pub payload: Vec<Message>,
    pub first_turn: bool,
}

pub fn assemble(input: AssemblyInput<'_>, cipher: &Cipher) -> Result<AssembledContext, CipherError> {
    let system = match (input.new_document, input.stored_document) {
        (Some(text), _) => Some(Message::system(format!("{UPLOADED_DOCUMENT_PREFIX}{text}"))),
        (None, Some(blob)) => {
            let text = cipher.decrypt(blob)?;
            Some(Message::system(format!("{STORED_DOCUMENT_PREFIX}{text}")))
        }
        (None, None) => None,
    };

    let mut updated_messages = Vec::with_capacity(input.history.len() + 1);
    updated_messages.extend_from_slice(input.history);
    updated_messages.push(input.inbound);

    let first_turn = updated_messages.len() == 1;

    let payload = system
        .iter()
        .cloned()
        .chain(updated_messages.iter().cloned())
        .collect();

    Ok(AssembledContext {
        system,
        updated_messages,
        payload,
        first_turn,
    })
}
