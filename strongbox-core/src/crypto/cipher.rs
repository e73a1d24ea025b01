//! AES-256-GCM encryption of record payloads.
//!
//! Blob layout: `nonce(12) || ciphertext || auth_tag(16)`. A fresh random
//! nonce is drawn for every call, so encrypting the same plaintext twice
//! yields different blobs.

use crate::crypto::{CryptoError, Result};
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// The symmetric key derived from the user's password.
///
/// Lives in memory only for the lifetime of a logged-in client and is
/// wiped on drop.
#[derive(Clone)]
pub struct EncryptionKey {
    key: [u8; 32],
}

impl EncryptionKey {
    pub fn from_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Get the raw key bytes (use sparingly)
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

impl PartialEq for EncryptionKey {
    fn eq(&self, other: &Self) -> bool {
        self.key.ct_eq(&other.key).into()
    }
}

impl Eq for EncryptionKey {}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

impl Drop for EncryptionKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// Encrypt `plaintext` under `key`, prepending the nonce.
pub fn encrypt(key: &EncryptionKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext_with_tag = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext_with_tag.len());
    blob.extend_from_slice(nonce.as_slice());
    blob.extend_from_slice(&ciphertext_with_tag);
    Ok(blob)
}

/// Decrypt a blob produced by [`encrypt`].
pub fn decrypt(key: &EncryptionKey, blob: &[u8]) -> Result<Vec<u8>> {
    if blob.len() < NONCE_LEN + TAG_LEN {
        return Err(CryptoError::MalformedInput(format!(
            "blob is {} bytes, need at least {}",
            blob.len(),
            NONCE_LEN + TAG_LEN
        )));
    }

    let (nonce_bytes, ciphertext_with_tag) = blob.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext_with_tag)
        .map_err(|_| CryptoError::AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> EncryptionKey {
        EncryptionKey::from_bytes([byte; 32])
    }

    #[test]
    fn test_roundtrip() {
        let k = key(7);
        let plaintext = br#"{"login":"a","password":"b"}"#;
        let blob = encrypt(&k, plaintext).unwrap();
        assert_eq!(blob.len(), NONCE_LEN + plaintext.len() + TAG_LEN);
        assert_eq!(decrypt(&k, &blob).unwrap(), plaintext);
    }

    #[test]
    fn test_roundtrip_empty_and_large() {
        let k = key(1);

        let blob = encrypt(&k, b"").unwrap();
        assert_eq!(blob.len(), NONCE_LEN + TAG_LEN);
        assert!(decrypt(&k, &blob).unwrap().is_empty());

        let large: Vec<u8> = (0..1_000_000u32).map(|i| (i % 251) as u8).collect();
        let blob = encrypt(&k, &large).unwrap();
        assert_eq!(decrypt(&k, &blob).unwrap(), large);
    }

    #[test]
    fn test_nondeterministic() {
        let k = key(2);
        let a = encrypt(&k, b"same").unwrap();
        let b = encrypt(&k, b"same").unwrap();
        assert_ne!(a, b);
        assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let blob = encrypt(&key(3), b"secret").unwrap();
        let result = decrypt(&key(4), &blob);
        assert!(matches!(result, Err(CryptoError::AuthenticationFailed)));
    }

    #[test]
    fn test_tampered_blob_fails_authentication() {
        let k = key(5);
        let mut blob = encrypt(&k, b"secret").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xFF;
        assert!(matches!(
            decrypt(&k, &blob),
            Err(CryptoError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_short_blob_is_malformed() {
        let k = key(6);
        assert!(matches!(decrypt(&k, &[0u8; 5]), Err(CryptoError::MalformedInput(_))));
        assert!(matches!(
            decrypt(&k, &[0u8; NONCE_LEN + TAG_LEN - 1]),
            Err(CryptoError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_key_equality_and_debug() {
        assert_eq!(key(9), key(9));
        assert_ne!(key(9), key(10));
        assert_eq!(format!("{:?}", key(9)), "EncryptionKey(..)");
    }
}
