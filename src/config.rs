//! TOML configuration parsing and validation.
//!
//! ```toml
//! [db]
//! path = "./data/vsync.sqlite"
//!
//! [server]
//! bind = "127.0.0.1:7340"
//!
//! [sync]
//! api_key = "secret"
//! endpoint_url = "https://vector.example.com"
//! timeout_secs = 30
//! batch_size = 50
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

/// Remote vector-indexing service settings.
#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Sent as the `X-Api-Key` header.
    pub api_key: String,
    /// Base URL; batches are posted to `{endpoint_url}/runs/wait`.
    pub endpoint_url: String,
    /// HTTP request timeout for export delivery.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Export limit used when none is given.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_batch_size() -> usize {
    50
}

impl SyncConfig {
    /// Full URL of the run endpoint. Trailing slashes on the base are dropped.
    pub fn runs_url(&self) -> String {
        format!("{}/runs/wait", self.endpoint_url.trim_end_matches('/'))
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.sync.api_key.trim().is_empty() {
        anyhow::bail!("sync.api_key must not be empty");
    }
    if config.sync.endpoint_url.trim().is_empty() {
        anyhow::bail!("sync.endpoint_url must not be empty");
    }
    if config.sync.timeout_secs == 0 {
        anyhow::bail!("sync.timeout_secs must be > 0");
    }
    if config.sync.batch_size == 0 {
        anyhow::bail!("sync.batch_size must be >= 1");
    }
    Ok(())
}
