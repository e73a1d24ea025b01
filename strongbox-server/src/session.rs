//! Account creation, login and session rotation.

use crate::error::ServerError;
use crate::storage::{RemoteStore, SessionRow, UserRow};
use crate::token::{TokenIssuer, TokenType};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use std::sync::Arc;
use strongbox_core::crypto::{hash_secret, verify_secret};
use strongbox_core::{KdfParams, TokenPair};
use uuid::Uuid;

/// Minimum decoded length of a client KDF salt.
pub const MIN_SALT_LEN: usize = 8;

/// A freshly issued session.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub tokens: TokenPair,
}

#[derive(Clone)]
pub struct SessionService {
    storage: RemoteStore,
    tokens: Arc<TokenIssuer>,
    verifier_kdf: KdfParams,
    /// Verified against when a login is unknown, so both failure paths cost
    /// one Argon2 evaluation.
    decoy_verifier: Arc<String>,
}

impl SessionService {
    pub fn new(
        storage: RemoteStore,
        tokens: TokenIssuer,
        verifier_kdf: KdfParams,
    ) -> Result<Self, ServerError> {
        let decoy_verifier = hash_secret(Uuid::new_v4().as_bytes(), &verifier_kdf)?;
        Ok(Self {
            storage,
            tokens: Arc::new(tokens),
            verifier_kdf,
            decoy_verifier: Arc::new(decoy_verifier),
        })
    }

    pub fn create_user(
        &self,
        login: &str,
        password_hash: &str,
        salt: &str,
    ) -> Result<Session, ServerError> {
        require_non_empty(login, "login")?;
        require_non_empty(password_hash, "password hash")?;
        let decoded = STANDARD
            .decode(salt)
            .map_err(|_| ServerError::BadRequest("salt is not valid base64".to_string()))?;
        if decoded.len() < MIN_SALT_LEN {
            return Err(ServerError::BadRequest(format!(
                "salt must be at least {} bytes",
                MIN_SALT_LEN
            )));
        }

        let user = UserRow {
            user_id: Uuid::new_v4(),
            login: login.to_string(),
            password_verifier: hash_secret(password_hash.as_bytes(), &self.verifier_kdf)?,
            salt: salt.to_string(),
            created_at: Utc::now().timestamp(),
        };
        self.storage.insert_user(&user)?;
        tracing::info!(user_id = %user.user_id, "Registered user");

        self.open_session(user.user_id)
    }

    /// Authenticate and open a new session; returns it with the user's salt.
    pub fn log_in(&self, login: &str, password_hash: &str) -> Result<(Session, String), ServerError> {
        require_non_empty(login, "login")?;
        require_non_empty(password_hash, "password hash")?;

        let Some(user) = self.storage.user_by_login(login)? else {
            verify_secret(password_hash.as_bytes(), &self.decoy_verifier)?;
            return Err(ServerError::InvalidCredentials);
        };
        if !verify_secret(password_hash.as_bytes(), &user.password_verifier)? {
            tracing::debug!(user_id = %user.user_id, "Rejected login");
            return Err(ServerError::InvalidCredentials);
        }

        let session = self.open_session(user.user_id)?;
        Ok((session, user.salt))
    }

    /// Exchange a refresh token for a new token pair.
    ///
    /// The presented token is single-use: its session is replaced. Any
    /// failure is reported as [`ServerError::SessionNotFound`].
    pub fn refresh_session(&self, refresh_token: &str) -> Result<Session, ServerError> {
        let session_id = self
            .tokens
            .verify(refresh_token, TokenType::Refresh)
            .map_err(|e| {
                tracing::debug!("Refresh token rejected: {}", e);
                ServerError::SessionNotFound
            })?;

        let now = Utc::now().timestamp();
        let user_id = self
            .storage
            .session_owner(session_id, refresh_token, now)?
            .ok_or(ServerError::SessionNotFound)?;

        let (next, row) = self.issue(user_id, now)?;
        self.storage
            .rotate_session(session_id, refresh_token, now, &row)?;
        tracing::debug!(user_id = %user_id, "Rotated session");
        Ok(next)
    }

    /// Verify an auth token and return the user it was issued to.
    pub fn verify_token(&self, auth_token: &str) -> Result<Uuid, ServerError> {
        self.tokens.verify(auth_token, TokenType::Auth)
    }

    fn open_session(&self, user_id: Uuid) -> Result<Session, ServerError> {
        let (session, row) = self.issue(user_id, Utc::now().timestamp())?;
        self.storage.insert_session(&row)?;
        Ok(session)
    }

    fn issue(&self, user_id: Uuid, now: i64) -> Result<(Session, SessionRow), ServerError> {
        let session_id = Uuid::new_v4();
        let tokens = TokenPair {
            auth_token: self.tokens.issue(TokenType::Auth, user_id)?,
            refresh_token: self.tokens.issue(TokenType::Refresh, session_id)?,
        };
        let row = SessionRow {
            session_id,
            user_id,
            refresh_token: tokens.refresh_token.clone(),
            created_at: now,
            expires_at: now + self.tokens.refresh_ttl_secs(),
        };
        Ok((
            Session {
                session_id,
                user_id,
                tokens,
            },
            row,
        ))
    }
}

fn require_non_empty(value: &str, what: &str) -> Result<(), ServerError> {
    if value.is_empty() {
        return Err(ServerError::BadRequest(format!("{} must not be empty", what)));
    }
    Ok(())
}
