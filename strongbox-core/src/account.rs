//! Registration and login.
//!
//! Login goes to the server first. If the server cannot be reached the
//! password is checked against the cached verifier instead, and the client
//! works offline with its last known token pair.

use crate::credentials::{CredentialStore, CredentialStoreError};
use crate::crypto::{derive_key, generate_salt, login_hash, verifier_hash, verify_key, KdfParams};
use crate::rpc::{CallContext, LoginRequest, RegisterRequest, RemoteClient, RpcError};
use crate::session::ClientSession;
use crate::{Result, StrongboxError};
use base64::{engine::general_purpose::STANDARD, Engine};
use std::sync::Arc;
use tracing::{info, warn};

/// How a login was authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMode {
    Online,
    Offline,
}

pub struct Account {
    remote: Arc<RemoteClient>,
    session: Arc<ClientSession>,
    credentials: CredentialStore,
    kdf: KdfParams,
}

impl Account {
    pub fn new(
        remote: Arc<RemoteClient>,
        session: Arc<ClientSession>,
        credentials: CredentialStore,
        kdf: KdfParams,
    ) -> Self {
        Self {
            remote,
            session,
            credentials,
            kdf,
        }
    }

    /// Create the account on the server and log in locally.
    pub async fn register(&self, login: &str, password: &str, cx: &CallContext) -> Result<()> {
        validate(login, password)?;

        let salt = generate_salt();
        let req = RegisterRequest {
            login: login.to_string(),
            password_hash: login_hash(login, password.as_bytes(), &self.kdf)?,
            salt: STANDARD.encode(salt),
        };
        let tokens = self.remote.create_user(&req, cx).await.map_err(|e| match e {
            RpcError::AlreadyExists(_) => StrongboxError::UserExists,
            other => other.into(),
        })?;

        let key = derive_key(password.as_bytes(), &salt, &self.kdf)?;
        let verifier = verifier_hash(&key, &self.kdf)?;
        self.credentials
            .save_profile(login, &verifier, &salt, &tokens)?;
        self.session.log_in(login, key, tokens);

        info!("Registered {}", login);
        Ok(())
    }

    /// Log in against the server, falling back to the cached verifier when
    /// the server is unreachable.
    pub async fn log_in(&self, login: &str, password: &str, cx: &CallContext) -> Result<LoginMode> {
        validate(login, password)?;

        let req = LoginRequest {
            login: login.to_string(),
            password_hash: login_hash(login, password.as_bytes(), &self.kdf)?,
        };
        match self.remote.log_in(&req, cx).await {
            Ok(resp) => {
                let salt = STANDARD
                    .decode(&resp.salt)
                    .map_err(|e| RpcError::Protocol(format!("invalid salt: {}", e)))?;
                let key = derive_key(password.as_bytes(), &salt, &self.kdf)?;
                let verifier = verifier_hash(&key, &self.kdf)?;
                self.credentials
                    .save_profile(login, &verifier, &salt, &resp.tokens)?;
                self.session.log_in(login, key, resp.tokens);
                info!("Logged in {} online", login);
                Ok(LoginMode::Online)
            }
            Err(RpcError::InvalidCredentials) => Err(StrongboxError::InvalidCredentials),
            Err(e) if e.is_transient() && cx.done().is_none() => {
                warn!("Server unreachable ({}), trying offline login", e);
                self.log_in_offline(login, password)?;
                Ok(LoginMode::Offline)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Verify the password against the cached verifier without the network.
    pub fn log_in_offline(&self, login: &str, password: &str) -> Result<()> {
        validate(login, password)?;

        let profile = match self.credentials.load_profile(login) {
            Ok(profile) => profile,
            Err(CredentialStoreError::ProfileNotFound(_)) => {
                return Err(StrongboxError::InvalidCredentials)
            }
            Err(e) => return Err(e.into()),
        };

        let key = derive_key(password.as_bytes(), &profile.salt, &self.kdf)?;
        if !verify_key(&key, &profile.verifier_hash)? {
            return Err(StrongboxError::InvalidCredentials);
        }
        self.session.log_in(login, key, profile.tokens);
        info!("Logged in {} offline", login);
        Ok(())
    }

    pub fn log_out(&self) {
        self.session.log_out();
    }
}

fn validate(login: &str, password: &str) -> Result<()> {
    if login.trim().is_empty() || password.is_empty() {
        return Err(StrongboxError::InvalidInput(
            "login and password must not be empty".to_string(),
        ));
    }
    Ok(())
}
