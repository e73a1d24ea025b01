//! strongbox client library
//!
//! Zero-knowledge secret manager: secrets are encrypted on the client,
//! cached in a local SQLite store and reconciled with a remote store that
//! only ever sees ciphertext.

pub mod account;
pub mod config;
pub mod credentials;
pub mod crypto;
pub mod models;
pub mod rpc;
pub mod session;
pub mod store;
pub mod sync;
pub mod vault;

pub use account::{Account, LoginMode};
pub use config::ClientConfig;
pub use credentials::{CredentialStore, CredentialStoreError, Profile};
pub use crypto::{CryptoError, EncryptionKey, KdfParams};
pub use models::{Record, RecordKind, RecordSummary, Secret, SyncDigest};
pub use rpc::{CallContext, HttpTransport, RemoteClient, RetryPolicy, RpcError, TokenPair, Transport};
pub use session::ClientSession;
pub use store::LocalStore;
pub use sync::{SyncEngine, SyncReport};
pub use vault::Vault;

use thiserror::Error;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, StrongboxError>;

/// General error type for client operations
#[derive(Error, Debug)]
pub enum StrongboxError {
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Credential store error: {0}")]
    Credentials(#[from] CredentialStoreError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Remote call failed: {0}")]
    Rpc(#[from] RpcError),

    #[error("Invalid login or password")]
    InvalidCredentials,

    #[error("User already exists")]
    UserExists,

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Record name already in use: {0}")]
    NameTaken(String),

    #[error("No data: {0}")]
    NoData(String),

    #[error("Storage constraint violated: {0}")]
    StorageConstraint(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
