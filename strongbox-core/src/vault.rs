//! User-facing secret operations on the local cache.
//!
//! Plaintext exists only inside these calls: secrets are serialized with
//! their kind's schema, encrypted under the session key, and stored as
//! ciphertext. Sync picks the changes up on its next cycle.

use crate::crypto::{decrypt, encrypt, EncryptionKey};
use crate::models::{Record, RecordKind, RecordSummary, Secret};
use crate::rpc::{CallContext, RemoteClient};
use crate::session::ClientSession;
use crate::store::LocalStore;
use crate::{Result, StrongboxError};
use std::sync::Arc;

pub struct Vault {
    store: LocalStore,
    session: Arc<ClientSession>,
}

impl Vault {
    pub fn new(store: LocalStore, session: Arc<ClientSession>) -> Self {
        Self { store, session }
    }

    pub fn add(&self, name: &str, secret: &Secret) -> Result<Record> {
        validate_name(name)?;
        let content = self.seal(secret)?;
        self.store.create_record(name, secret.kind(), content)
    }

    /// Replace the secret stored under `name`. The kind cannot change.
    pub fn update(&self, name: &str, secret: &Secret) -> Result<Record> {
        let existing = self.store.get_by_name(name)?;
        if existing.kind != secret.kind() {
            return Err(StrongboxError::InvalidInput(format!(
                "{} holds a {} secret, not a {}",
                name,
                existing.kind,
                secret.kind()
            )));
        }
        let content = self.seal(secret)?;
        self.store.update_record(name, content)
    }

    pub fn get(&self, name: &str) -> Result<Secret> {
        let record = self.store.get_by_name(name)?;
        let content = record
            .content
            .ok_or_else(|| StrongboxError::NoData(format!("{} has no content", name)))?;
        self.open(record.kind, &content)
    }

    pub fn list(&self) -> Result<Vec<RecordSummary>> {
        self.store.list_summaries()
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        self.store.delete_by_name(name)
    }

    /// Read a secret straight from the server, bypassing the cache.
    pub async fn fetch_remote(&self, remote: &RemoteClient, name: &str, cx: &CallContext) -> Result<Secret> {
        let key = self.key()?;
        let content = remote.get_record_content(name, cx).await?;
        let blob = content
            .content
            .ok_or_else(|| StrongboxError::NoData(format!("{} has no content", name)))?;
        let plaintext = decrypt(&key, &blob)?;
        Ok(Secret::from_plaintext(content.kind, &plaintext)?)
    }

    fn seal(&self, secret: &Secret) -> Result<Vec<u8>> {
        let key = self.key()?;
        let plaintext = secret.to_plaintext()?;
        Ok(encrypt(&key, &plaintext)?)
    }

    fn open(&self, kind: RecordKind, content: &[u8]) -> Result<Secret> {
        let key = self.key()?;
        let plaintext = decrypt(&key, content)?;
        Ok(Secret::from_plaintext(kind, &plaintext)?)
    }

    fn key(&self) -> Result<EncryptionKey> {
        self.session.key().ok_or(StrongboxError::NotLoggedIn)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(StrongboxError::InvalidInput("name must not be empty".to_string()));
    }
    Ok(())
}
