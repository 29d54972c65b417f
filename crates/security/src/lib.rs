//! Security primitives for FinTrack.
//!
//! - [`cipher`]: AES-256-CBC encryption of extracted document text at rest

pub mod cipher;

pub use cipher::{Cipher, SecretKey};
