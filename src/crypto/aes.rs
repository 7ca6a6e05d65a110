use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};
use crate::error::{AppError, Result};

/// The size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// The size of the AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// The size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// A secure key wrapper that ensures the key is zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecureKey([u8; KEY_SIZE]);

impl SecureKey {
    /// Creates a new `SecureKey` from a byte array.
    pub fn new(key: [u8; KEY_SIZE]) -> Self {
        Self(key)
    }

    /// Builds a key from a slice, which must be exactly `KEY_SIZE` bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let key: [u8; KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| AppError::Encryption(format!("Key must be {} bytes", KEY_SIZE)))?;
        Ok(Self(key))
    }

    /// Returns a reference to the key as a byte slice.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for SecureKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecureKey(..)")
    }
}

/// Why a sealed value could not be opened.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unreadable {
    /// Shorter than a nonce plus a tag.
    #[error("ciphertext truncated")]
    Truncated,
    /// Authentication failed: wrong key, wrong slot, or modified bytes.
    #[error("ciphertext failed authentication")]
    Tampered,
    /// Decrypted, but the plaintext is not the expected type.
    #[error("plaintext could not be decoded")]
    Undecodable,
}

/// Generates a new random AES-256 key.
pub fn generate_key() -> SecureKey {
    let mut key = [0u8; KEY_SIZE];
    OsRng.fill_bytes(&mut key);
    SecureKey::new(key)
}

/// Generates a new random AES-GCM nonce.
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Encrypts `plaintext` with AES-256-GCM, binding it to `aad`.
///
/// The returned buffer is `nonce || ciphertext || tag`.
pub fn seal(key: &SecureKey, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let nonce_bytes = generate_nonce();
    let nonce = Nonce::from(nonce_bytes);

    let ciphertext = cipher
        .encrypt(&nonce, Payload { msg: plaintext, aad })
        .map_err(|e| AppError::Encryption(format!("Encryption failed: {}", e)))?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Reverses [`seal`]. Never panics on hostile input.
pub fn open(key: &SecureKey, aad: &[u8], sealed: &[u8]) -> std::result::Result<Vec<u8>, Unreadable> {
    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(Unreadable::Truncated);
    }

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, Payload { msg: ciphertext, aad })
        .map_err(|_| Unreadable::Tampered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_open() {
        let key = generate_key();
        let sealed = seal(&key, b"session:abc", b"hello").unwrap();
        assert_eq!(sealed.len(), NONCE_SIZE + 5 + TAG_SIZE);
        assert_eq!(open(&key, b"session:abc", &sealed).unwrap(), b"hello");
    }

    #[test]
    fn nonces_differ_between_calls() {
        let key = generate_key();
        let a = seal(&key, b"k", b"same").unwrap();
        let b = seal(&key, b"k", b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn every_flipped_byte_is_detected() {
        let key = generate_key();
        let sealed = seal(&key, b"slot", b"{\"theme\":\"dark\"}").unwrap();
        for i in 0..sealed.len() {
            let mut tampered = sealed.clone();
            tampered[i] ^= 0x01;
            assert_eq!(open(&key, b"slot", &tampered), Err(Unreadable::Tampered), "byte {}", i);
        }
    }

    #[test]
    fn wrong_aad_or_key_is_rejected() {
        let key = generate_key();
        let sealed = seal(&key, b"session:a", b"payload").unwrap();
        assert_eq!(open(&key, b"session:b", &sealed), Err(Unreadable::Tampered));
        assert_eq!(open(&generate_key(), b"session:a", &sealed), Err(Unreadable::Tampered));
    }

    #[test]
    fn short_input_is_truncated() {
        let key = generate_key();
        assert_eq!(open(&key, b"", &[]), Err(Unreadable::Truncated));
        assert_eq!(open(&key, b"", &[0u8; NONCE_SIZE + TAG_SIZE - 1]), Err(Unreadable::Truncated));
    }

    #[test]
    fn key_from_slice_checks_length() {
        assert!(SecureKey::from_slice(&[7u8; KEY_SIZE]).is_ok());
        assert!(SecureKey::from_slice(&[7u8; 16]).is_err());
    }
}
