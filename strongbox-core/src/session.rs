//! In-process login state of the client.
//!
//! The encryption key exists only here and only while logged in. Rotated
//! tokens are written through to the credential store so a later offline
//! login starts from the newest pair.

use crate::credentials::CredentialStore;
use crate::crypto::EncryptionKey;
use crate::rpc::TokenPair;
use std::sync::{PoisonError, RwLock};

struct LoggedIn {
    profile: String,
    key: EncryptionKey,
    tokens: TokenPair,
}

pub struct ClientSession {
    state: RwLock<Option<LoggedIn>>,
    credentials: Option<CredentialStore>,
}

impl ClientSession {
    pub fn new(credentials: Option<CredentialStore>) -> Self {
        Self {
            state: RwLock::new(None),
            credentials,
        }
    }

    pub fn log_in(&self, profile: &str, key: EncryptionKey, tokens: TokenPair) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = Some(LoggedIn {
            profile: profile.to_string(),
            key,
            tokens,
        });
    }

    /// Drop the key and tokens from memory.
    pub fn log_out(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = None;
    }

    pub fn is_logged_in(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn profile(&self) -> Option<String> {
        self.with_state(|s| s.profile.clone())
    }

    pub fn key(&self) -> Option<EncryptionKey> {
        self.with_state(|s| s.key.clone())
    }

    pub fn tokens(&self) -> Option<TokenPair> {
        self.with_state(|s| s.tokens.clone())
    }

    /// Install a freshly issued token pair and persist it for the profile.
    pub fn update_tokens(&self, tokens: TokenPair) {
        let profile = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            match state.as_mut() {
                Some(logged_in) => {
                    logged_in.tokens = tokens.clone();
                    logged_in.profile.clone()
                }
                None => return,
            }
        };

        if let Some(store) = &self.credentials {
            if let Err(e) = store.update_tokens(&profile, &tokens) {
                tracing::warn!("Failed to persist rotated tokens for {}: {}", profile, e);
            }
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&LoggedIn) -> T) -> Option<T> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(f)
    }
}
