//! On-disk credential store for offline login.
//!
//! One JSON document maps each local profile (login) to its verifier hash,
//! key-derivation salt and last-issued token pair. Binary values are base64.

use crate::rpc::TokenPair;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CredentialStoreError {
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Credential store is corrupt: {0}")]
    CorruptStore(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

type Result<T> = std::result::Result<T, CredentialStoreError>;

/// Everything cached locally about one profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub verifier_hash: String,
    pub salt: Vec<u8>,
    pub tokens: TokenPair,
}

#[derive(Serialize, Deserialize)]
struct StoredProfile {
    verifier_hash: String,
    salt: String,
    auth_token: String,
    refresh_token: String,
}

/// File-backed map of profile id to [`Profile`].
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or replace the profile entry.
    pub fn save_profile(
        &self,
        profile_id: &str,
        verifier_hash: &str,
        salt: &[u8],
        tokens: &TokenPair,
    ) -> Result<()> {
        let mut profiles = self.read_all()?;
        profiles.insert(
            profile_id.to_string(),
            StoredProfile {
                verifier_hash: verifier_hash.to_string(),
                salt: STANDARD.encode(salt),
                auth_token: tokens.auth_token.clone(),
                refresh_token: tokens.refresh_token.clone(),
            },
        );
        self.write_all(&profiles)
    }

    pub fn load_profile(&self, profile_id: &str) -> Result<Profile> {
        let profiles = self.read_all()?;
        let stored = profiles
            .get(profile_id)
            .ok_or_else(|| CredentialStoreError::ProfileNotFound(profile_id.to_string()))?;

        let salt = STANDARD
            .decode(&stored.salt)
            .map_err(|e| CredentialStoreError::CorruptStore(format!("bad salt: {}", e)))?;

        Ok(Profile {
            verifier_hash: stored.verifier_hash.clone(),
            salt,
            tokens: TokenPair {
                auth_token: stored.auth_token.clone(),
                refresh_token: stored.refresh_token.clone(),
            },
        })
    }

    /// Replace only the token pair of an existing profile.
    pub fn update_tokens(&self, profile_id: &str, tokens: &TokenPair) -> Result<()> {
        let mut profiles = self.read_all()?;
        let stored = profiles
            .get_mut(profile_id)
            .ok_or_else(|| CredentialStoreError::ProfileNotFound(profile_id.to_string()))?;
        stored.auth_token = tokens.auth_token.clone();
        stored.refresh_token = tokens.refresh_token.clone();
        self.write_all(&profiles)
    }

    fn read_all(&self) -> Result<BTreeMap<String, StoredProfile>> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_slice(&raw).map_err(|e| CredentialStoreError::CorruptStore(e.to_string()))
    }

    fn write_all(&self, profiles: &BTreeMap<String, StoredProfile>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_vec_pretty(profiles)
            .map_err(|e| CredentialStoreError::CorruptStore(e.to_string()))?;

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        restrict_permissions(&tmp)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(tag: &str) -> TokenPair {
        TokenPair {
            auth_token: format!("auth-{}", tag),
            refresh_token: format!("refresh-{}", tag),
        }
    }

    #[test]
    fn test_missing_file_is_profile_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("profiles.json"));
        assert!(matches!(
            store.load_profile("alice"),
            Err(CredentialStoreError::ProfileNotFound(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("profiles.json"));

        store
            .save_profile("alice", "$argon2id$v=19$...", &[1, 2, 3], &tokens("1"))
            .unwrap();
        store
            .save_profile("bob", "$argon2id$bob", &[9], &tokens("b"))
            .unwrap();

        let alice = store.load_profile("alice").unwrap();
        assert_eq!(alice.verifier_hash, "$argon2id$v=19$...");
        assert_eq!(alice.salt, vec![1, 2, 3]);
        assert_eq!(alice.tokens, tokens("1"));
        assert_eq!(store.load_profile("bob").unwrap().salt, vec![9]);
    }

    #[test]
    fn test_save_overwrites_profile() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("profiles.json"));
        store.save_profile("alice", "v1", &[1], &tokens("1")).unwrap();
        store.save_profile("alice", "v2", &[2], &tokens("2")).unwrap();

        let alice = store.load_profile("alice").unwrap();
        assert_eq!(alice.verifier_hash, "v2");
        assert_eq!(alice.tokens, tokens("2"));
    }

    #[test]
    fn test_update_tokens_keeps_verifier() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("profiles.json"));
        store.save_profile("alice", "v1", &[1], &tokens("1")).unwrap();
        store.update_tokens("alice", &tokens("rotated")).unwrap();

        let alice = store.load_profile("alice").unwrap();
        assert_eq!(alice.verifier_hash, "v1");
        assert_eq!(alice.tokens, tokens("rotated"));

        assert!(matches!(
            store.update_tokens("nobody", &tokens("x")),
            Err(CredentialStoreError::ProfileNotFound(_))
        ));
    }

    #[test]
    fn test_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        std::fs::write(&path, b"{not json").unwrap();
        let store = CredentialStore::new(&path);
        assert!(matches!(
            store.load_profile("alice"),
            Err(CredentialStoreError::CorruptStore(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        let store = CredentialStore::new(&path);
        store.save_profile("alice", "v", &[1], &tokens("1")).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
