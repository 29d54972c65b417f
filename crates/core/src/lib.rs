//! # FinTrack Core
//!
//! Domain types, traits, and error definitions for the FinTrack statement
//! assistant. This crate has **zero framework dependencies**: it defines the
//! domain model that all other crates implement against.
//!
//! ## Seams
//!
//! Every external collaborator is a trait here, with implementations in
//! their own crates:
//! - [`Provider`]: the language-model backend (`fintrack-providers`)
//! - [`ChatStore`]: chat and upload persistence (`fintrack-store`)
//! - [`DocumentExtractor`]: binary document to plain text (`fintrack-pipeline`)

pub mod error;
pub mod extractor;
pub mod message;
pub mod provider;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use error::{ChatError, Result};
pub use extractor::{Attachment, DocumentExtractor};
pub use message::{Chat, ChatId, DocumentUpload, EncryptedBlob, Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse};
pub use store::ChatStore;
