//! Cryptographic primitives for the secret manager.
//!
//! This module provides:
//! - Argon2id key derivation from (password, salt)
//! - AES-256-GCM encryption of record payloads
//! - Verifier hashes for offline login
//! - Content hashing for sync digests

pub mod cipher;
pub mod digest;
pub mod kdf;

pub use cipher::{decrypt, encrypt, EncryptionKey, NONCE_LEN, TAG_LEN};
pub use digest::content_hash;
pub use kdf::{
    derive_key, generate_salt, hash_secret, login_hash, verifier_hash, verify_key, verify_secret,
    KdfParams,
};

use thiserror::Error;

/// Errors that can occur in cryptographic operations
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Key derivation failed: {0}")]
    KdfFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Malformed ciphertext: {0}")]
    MalformedInput(String),

    #[error("Authentication failed - wrong key or tampered data")]
    AuthenticationFailed,

    #[error("Verifier error: {0}")]
    Verifier(String),
}

/// Result type for crypto operations
pub type Result<T> = std::result::Result<T, CryptoError>;
