//! Configuration management for the CLI
//!
//! Settings come from `~/.config/portal/config.toml` (if present), then
//! `PORTAL_*` environment variables, then command-line flags.

use anyhow::{Context, Result};
use portal_lib::SyncConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CLI configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    /// API root URL
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// How long identical reads are served from cache, in seconds
    #[serde(default = "default_dedup_ttl")]
    pub dedup_ttl_secs: u64,

    /// Where downloaded project files are written
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

fn default_api_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_dedup_ttl() -> u64 {
    10
}

fn default_download_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            request_timeout_secs: default_request_timeout(),
            dedup_ttl_secs: default_dedup_ttl(),
            download_dir: default_download_dir(),
        }
    }
}

impl CliConfig {
    /// Load configuration from the config file and environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path(),
        };

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let config = builder
            .add_source(config::Environment::with_prefix("PORTAL"))
            .build()
            .context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// Default configuration file path
    pub fn default_path() -> Option<PathBuf> {
        let home = dirs_next::home_dir()?;
        Some(home.join(".config").join("portal").join("config.toml"))
    }

    pub fn to_sync_config(&self) -> SyncConfig {
        SyncConfig {
            api_url: self.api_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            dedup_ttl: Duration::from_secs(self.dedup_ttl_secs),
            download_dir: self.download_dir.clone(),
            session: "cli".to_string(),
        }
    }
}
