//! Symmetric encryption of extracted document text.
//!
//! AES-256-CBC with PKCS#7 padding and a fresh random 16-byte IV per call.
//! Blobs are encoded as `<hex iv>:<hex ciphertext>` so they can be stored
//! verbatim in any text column and decrypted by anything holding the same
//! 32-byte secret.

use aes::Aes256;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use fintrack_config::{ConfigError, EncryptionConfig, SECRET_KEY_LEN};
use fintrack_core::error::CipherError;
use fintrack_core::message::EncryptedBlob;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;
const DELIMITER: char = ':';

/// A validated 32-byte secret.
#[derive(Clone)]
pub struct SecretKey([u8; SECRET_KEY_LEN]);

impl SecretKey {
    /// Build from raw bytes; anything but exactly 32 bytes is rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CipherError> {
        let key: [u8; SECRET_KEY_LEN] = bytes.try_into().map_err(|_| {
            CipherError::InvalidKey(format!(
                "expected {SECRET_KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(key))
    }

    /// Load the secret from configuration. Fatal at startup if absent or malformed.
    pub fn from_config(config: &EncryptionConfig) -> Result<Self, ConfigError> {
        config.secret_bytes().map(Self)
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey([REDACTED])")
    }
}

/// Encrypts and decrypts document text with a process-wide secret.
#[derive(Debug, Clone)]
pub struct Cipher {
    key: SecretKey,
}

impl Cipher {
    pub fn new(key: SecretKey) -> Self {
        Self { key }
    }

    /// Encrypt non-empty text into a fresh blob.
    pub fn encrypt(&self, text: &str) -> Result<EncryptedBlob, CipherError> {
        if text.is_empty() {
            return Err(CipherError::InvalidInput("text must be non-empty".into()));
        }

        let iv = generate_iv();
        let encryptor = Aes256CbcEnc::new_from_slices(&self.key.0, &iv)
            .map_err(|e| CipherError::InvalidKey(e.to_string()))?;
        let ciphertext = encryptor.encrypt_padded_vec_mut::<Pkcs7>(text.as_bytes());

        Ok(EncryptedBlob(format!(
            "{}{DELIMITER}{}",
            hex::encode(iv),
            hex::encode(ciphertext)
        )))
    }

    /// Decrypt a blob produced with the same secret.
    pub fn decrypt(&self, blob: &EncryptedBlob) -> Result<String, CipherError> {
        let (iv_hex, ciphertext_hex) = blob
            .as_str()
            .split_once(DELIMITER)
            .ok_or_else(|| malformed("missing delimiter"))?;

        if ciphertext_hex.contains(DELIMITER) {
            return Err(malformed("more than one delimiter"));
        }

        let iv = hex::decode(iv_hex).map_err(|e| malformed(&format!("iv: {e}")))?;
        if iv.len() != IV_LEN {
            return Err(malformed(&format!("iv must be {IV_LEN} bytes, got {}", iv.len())));
        }

        let ciphertext =
            hex::decode(ciphertext_hex).map_err(|e| malformed(&format!("ciphertext: {e}")))?;
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
            return Err(malformed("ciphertext is not a whole number of blocks"));
        }

        let decryptor = Aes256CbcDec::new_from_slices(&self.key.0, &iv)
            .map_err(|e| CipherError::InvalidKey(e.to_string()))?;
        let plaintext = decryptor
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| {
                CipherError::DecryptionFailed("bad padding (corrupt data or wrong secret)".into())
            })?;

        String::from_utf8(plaintext)
            .map_err(|_| CipherError::DecryptionFailed("plaintext is not valid UTF-8".into()))
    }
}

fn malformed(reason: &str) -> CipherError {
    CipherError::DecryptionFailed(format!("malformed blob: {reason}"))
}

fn generate_iv() -> [u8; IV_LEN] {
    use rand::Rng;
    let mut rng = rand::rng();
    let mut iv = [0u8; IV_LEN];
    rng.fill(&mut iv[..]);
    iv
}
