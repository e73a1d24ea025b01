//! Argon2id key derivation and verifier hashing.
//!
//! Three derived values exist per user:
//! - the encryption key, `derive_key(password, salt)`, never persisted
//! - the login hash sent to the server, `login_hash(login, password)`
//! - the local verifier, an Argon2 PHC string over the encryption key

use crate::crypto::{CryptoError, EncryptionKey, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

pub const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;
const LOGIN_SALT_DOMAIN: &[u8] = b"strongbox-login-v1:";

/// Cost parameters for Argon2id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub mem_cost: u32,

    /// Number of iterations
    pub time_cost: u32,

    /// Number of lanes
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            mem_cost: 19_456,
            time_cost: 2,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    pub fn new(mem_cost: u32, time_cost: u32, parallelism: u32) -> Self {
        Self {
            mem_cost,
            time_cost,
            parallelism,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.parallelism < 1 {
            return Err(CryptoError::KdfFailed(
                "Parallelism too low (minimum: 1)".to_string(),
            ));
        }
        if self.time_cost < 1 {
            return Err(CryptoError::KdfFailed(
                "Time cost too low (minimum: 1)".to_string(),
            ));
        }
        if self.mem_cost < 8 * self.parallelism {
            return Err(CryptoError::KdfFailed(format!(
                "Memory cost too low (minimum: {} KiB)",
                8 * self.parallelism
            )));
        }
        Ok(())
    }

    fn argon2(&self) -> Result<Argon2<'static>> {
        self.validate()?;
        let params = Params::new(
            self.mem_cost,
            self.time_cost,
            self.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| CryptoError::KdfFailed(format!("Invalid parameters: {}", e)))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Generate a fresh random salt for a new account.
pub fn generate_salt() -> [u8; SALT_LEN] {
    rand::random()
}

/// Derive the 32-byte encryption key from a password and salt.
///
/// Deterministic for the same inputs, so the key can be re-derived at
/// every login without ever being stored.
pub fn derive_key(password: &[u8], salt: &[u8], params: &KdfParams) -> Result<EncryptionKey> {
    let mut out = [0u8; KEY_LEN];
    params
        .argon2()?
        .hash_password_into(password, salt, &mut out)
        .map_err(|e| CryptoError::KdfFailed(format!("Hashing failed: {}", e)))?;
    let key = EncryptionKey::from_bytes(out);
    out.zeroize();
    Ok(key)
}

/// Hash of (login, password) presented to the server at registration and login.
///
/// Salted by the login alone so it can be computed before the server hands
/// back the account salt; the server stores only its own hash of this value.
pub fn login_hash(login: &str, password: &[u8], params: &KdfParams) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(LOGIN_SALT_DOMAIN);
    hasher.update(login.as_bytes());
    let salt = hasher.finalize();

    let mut out = [0u8; KEY_LEN];
    params
        .argon2()?
        .hash_password_into(password, &salt[..SALT_LEN], &mut out)
        .map_err(|e| CryptoError::KdfFailed(format!("Hashing failed: {}", e)))?;
    let encoded = hex::encode(out);
    out.zeroize();
    Ok(encoded)
}

/// Irreversible PHC-format verifier of an encryption key, for offline login.
pub fn verifier_hash(key: &EncryptionKey, params: &KdfParams) -> Result<String> {
    hash_secret(key.as_bytes(), params)
}

/// Check a key against a verifier produced by [`verifier_hash`].
///
/// Returns `Ok(false)` on mismatch; `Err` only if the verifier is unparsable.
pub fn verify_key(key: &EncryptionKey, verifier: &str) -> Result<bool> {
    verify_secret(key.as_bytes(), verifier)
}

/// Salted Argon2id PHC string of an arbitrary secret.
pub fn hash_secret(secret: &[u8], params: &KdfParams) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    params
        .argon2()?
        .hash_password(secret, &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CryptoError::Verifier(e.to_string()))
}

/// Constant-time check of `secret` against a PHC string from [`hash_secret`].
pub fn verify_secret(secret: &[u8], phc: &str) -> Result<bool> {
    let parsed = PasswordHash::new(phc).map_err(|e| CryptoError::Verifier(e.to_string()))?;
    match Argon2::default().verify_password(secret, &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(CryptoError::Verifier(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> KdfParams {
        KdfParams::new(64, 1, 1)
    }

    #[test]
    fn test_kdf_params_validation() {
        assert!(KdfParams::default().validate().is_ok());
        assert!(KdfParams::new(64, 0, 1).validate().is_err());
        assert!(KdfParams::new(64, 1, 0).validate().is_err());
        assert!(KdfParams::new(15, 1, 2).validate().is_err());
    }

    #[test]
    fn test_derive_key_deterministic() {
        let salt = [3u8; SALT_LEN];
        let k1 = derive_key(b"hunter2", &salt, &cheap()).unwrap();
        let k2 = derive_key(b"hunter2", &salt, &cheap()).unwrap();
        assert_eq!(k1, k2);

        let k3 = derive_key(b"hunter3", &salt, &cheap()).unwrap();
        assert_ne!(k1, k3);

        let k4 = derive_key(b"hunter2", &[4u8; SALT_LEN], &cheap()).unwrap();
        assert_ne!(k1, k4);
    }

    #[test]
    fn test_derive_key_rejects_short_salt() {
        assert!(derive_key(b"pw", b"short", &cheap()).is_err());
    }

    #[test]
    fn test_generate_salt_unique() {
        assert_ne!(generate_salt(), generate_salt());
    }

    #[test]
    fn test_login_hash_depends_on_login() {
        let a = login_hash("alice", b"pw", &cheap()).unwrap();
        let again = login_hash("alice", b"pw", &cheap()).unwrap();
        let b = login_hash("bob", b"pw", &cheap()).unwrap();
        assert_eq!(a, again);
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_verifier_roundtrip() {
        let key = derive_key(b"pw", &[1u8; SALT_LEN], &cheap()).unwrap();
        let verifier = verifier_hash(&key, &cheap()).unwrap();
        assert!(verifier.starts_with("$argon2id$"));
        assert!(verify_key(&key, &verifier).unwrap());

        let other = derive_key(b"wrong", &[1u8; SALT_LEN], &cheap()).unwrap();
        assert!(!verify_key(&other, &verifier).unwrap());
    }

    #[test]
    fn test_hash_secret_uses_fresh_salt() {
        let a = hash_secret(b"login-hash", &cheap()).unwrap();
        let b = hash_secret(b"login-hash", &cheap()).unwrap();
        assert_ne!(a, b);
        assert!(verify_secret(b"login-hash", &a).unwrap());
        assert!(verify_secret(b"login-hash", &b).unwrap());
        assert!(!verify_secret(b"other", &a).unwrap());
    }

    #[test]
    fn test_verify_key_rejects_garbage_verifier() {
        let key = EncryptionKey::from_bytes([0u8; 32]);
        assert!(verify_key(&key, "not a phc string").is_err());
    }
}
