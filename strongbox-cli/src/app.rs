//! Client wiring for one CLI invocation.

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use strongbox_core::{
    Account, CallContext, ClientConfig, ClientSession, CredentialStore, HttpTransport, LocalStore,
    LoginMode, RemoteClient, SyncEngine, Vault,
};
use tracing::warn;

pub const PASSWORD_ENV: &str = "STRONGBOX_PASSWORD";

pub struct App {
    pub config: ClientConfig,
    pub login: String,
    pub session: Arc<ClientSession>,
    pub remote: Arc<RemoteClient>,
    pub account: Account,
    pub vault: Vault,
    pub engine: Arc<SyncEngine>,
}

impl App {
    pub fn open(config: ClientConfig, login: &str) -> Result<Self> {
        if login.trim().is_empty() {
            bail!("a login is required (--login or STRONGBOX_LOGIN)");
        }
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("cannot create {}", config.data_dir.display()))?;

        let credentials = CredentialStore::new(config.credentials_path());
        let session = Arc::new(ClientSession::new(Some(credentials.clone())));
        let transport = Arc::new(HttpTransport::new(
            &config.server_url,
            config.request_timeout(),
        )?);
        let remote = Arc::new(RemoteClient::new(
            transport,
            session.clone(),
            config.retry_policy(),
        ));
        let store = LocalStore::open(config.profile_db_path(login))?;

        Ok(Self {
            account: Account::new(remote.clone(), session.clone(), credentials, config.kdf),
            vault: Vault::new(store.clone(), session.clone()),
            engine: Arc::new(SyncEngine::new(store, remote.clone())),
            login: login.to_string(),
            config,
            session,
            remote,
        })
    }

    pub async fn register(&self, cx: &CallContext) -> Result<()> {
        let password = read_password(true)?;
        self.account.register(&self.login, &password, cx).await?;
        Ok(())
    }

    pub async fn log_in(&self, cx: &CallContext) -> Result<LoginMode> {
        let password = read_password(false)?;
        let mode = self.account.log_in(&self.login, &password, cx).await?;
        if mode == LoginMode::Offline {
            warn!("Server unreachable, working from the local cache");
        }
        Ok(mode)
    }

    /// One sync cycle that only warns on failure; local changes stay queued.
    pub async fn sync_quietly(&self, cx: &CallContext) {
        if !self.remote.connectivity().is_online() {
            return;
        }
        if let Err(e) = self.engine.sync(cx).await {
            warn!("Sync failed, changes will be sent later: {}", e);
        }
    }
}

fn read_password(confirm: bool) -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }
    let password = rpassword::prompt_password("Password: ")?;
    if confirm {
        let again = rpassword::prompt_password("Repeat password: ")?;
        if again != password {
            bail!("passwords do not match");
        }
    }
    Ok(password)
}
