//! Language-model providers for FinTrack.
//!
//! All providers implement the `fintrack_core::Provider` trait.
//! The router builds the configured provider at startup.

pub mod openai_compat;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use router::ProviderRouter;
