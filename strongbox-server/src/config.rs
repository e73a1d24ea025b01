//! Server configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use strongbox_core::KdfParams;

/// Environment variable that overrides `token_secret`.
pub const TOKEN_SECRET_ENV: &str = "STRONGBOX_TOKEN_SECRET";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub storage_path: PathBuf,
    /// HMAC secret for signing session tokens.
    pub token_secret: String,
    pub auth_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub max_payload_size: usize,
    pub cleanup_interval_secs: u64,
    /// Cost of the server-side verifier over client login hashes.
    pub verifier_kdf: KdfParams,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8081".to_string(),
            storage_path: PathBuf::from("strongbox.db"),
            token_secret: String::new(),
            auth_token_ttl_secs: 24 * 3600,
            refresh_token_ttl_secs: 48 * 3600,
            max_payload_size: 4 * 1024 * 1024,
            cleanup_interval_secs: 3600,
            verifier_kdf: KdfParams::default(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml_dep::from_str(&content)?;
        Ok(config)
    }

    /// Reject configurations the server cannot safely run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.token_secret.len() < 32 {
            anyhow::bail!(
                "token_secret must be at least 32 bytes (set it in the config or {})",
                TOKEN_SECRET_ENV
            );
        }
        if self.auth_token_ttl_secs <= 0 || self.refresh_token_ttl_secs <= 0 {
            anyhow::bail!("token lifetimes must be positive");
        }
        self.verifier_kdf.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");
        std::fs::write(&path, "listen_addr = \"0.0.0.0:9000\"\n").unwrap();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.auth_token_ttl_secs, 24 * 3600);
        assert_eq!(config.refresh_token_ttl_secs, 48 * 3600);
    }

    #[test]
    fn short_secret_is_rejected() {
        let mut config = ServerConfig {
            token_secret: "short".into(),
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
        config.token_secret = "x".repeat(32);
        assert!(config.validate().is_ok());
    }
}
