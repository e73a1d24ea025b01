//! Client configuration.

use crate::crypto::KdfParams;
use crate::rpc::RetryPolicy;
use crate::{Result, StrongboxError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_url: String,
    pub data_dir: PathBuf,
    /// Defaults to `<data_dir>/profiles.json`.
    pub credentials_file: Option<PathBuf>,
    pub sync_interval_secs: u64,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_jitter: f64,
    pub request_timeout_secs: u64,
    pub kdf: KdfParams,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let data_dir = std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".strongbox"))
            .unwrap_or_else(|| PathBuf::from(".strongbox"));

        Self {
            server_url: "http://127.0.0.1:8081".to_string(),
            data_dir,
            credentials_file: None,
            sync_interval_secs: 10,
            retry_attempts: 10,
            retry_base_delay_ms: 50,
            retry_jitter: 0.1,
            request_timeout_secs: 30,
            kdf: KdfParams::default(),
        }
    }
}

impl ClientConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml_dep::from_str(&content).map_err(|e| StrongboxError::Config(e.to_string()))?;
        config.kdf.validate()?;
        Ok(config)
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.credentials_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("profiles.json"))
    }

    /// Cache database for one profile.
    pub fn profile_db_path(&self, login: &str) -> PathBuf {
        let file: String = login
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
            .collect();
        self.data_dir.join(format!("{}.db", file))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            jitter: self.retry_jitter,
        }
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
