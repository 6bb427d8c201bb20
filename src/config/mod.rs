//! Configuration and credential storage

mod storage;

pub use storage::FileStorage;

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::api::client::RequestKind;

const DEFAULT_BASE_URL: &str = "http://localhost:8000/crud";

/// Environment variable overriding `base_url`.
pub const BASE_URL_ENV: &str = "RECRUIT_API_BASE_URL";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend root, e.g. `http://host:8000/crud`
    pub base_url: String,
    pub timeouts: Timeouts,
    /// Where downloads land when `--out` is not given (defaults to cwd)
    pub download_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeouts: Timeouts::default(),
            download_dir: None,
        }
    }
}

/// Per-class request timeouts, in seconds
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub interactive_secs: u64,
    pub transfer_secs: u64,
    pub polling_secs: u64,
    pub refresh_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            interactive_secs: 30,
            transfer_secs: 120,
            polling_secs: 5,
            refresh_secs: 10,
        }
    }
}

impl Timeouts {
    pub fn for_kind(&self, kind: RequestKind) -> Duration {
        let secs = match kind {
            RequestKind::Interactive => self.interactive_secs,
            RequestKind::Transfer => self.transfer_secs,
            RequestKind::Polling => self.polling_secs,
        };
        Duration::from_secs(secs)
    }

    pub fn refresh(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }
}

impl Config {
    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "recruit-cli", "recruit-cli")
            .context("Could not determine config directory")
    }

    /// Get config file path
    fn config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Get credentials file path
    pub fn credentials_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().join("credentials.toml"))
    }

    /// Load configuration from disk, then apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        let mut config = if path.exists() {
            let content = fs::read_to_string(&path).context("Failed to read config file")?;
            Self::parse(&content)?
        } else {
            Self::default()
        };

        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            if !base_url.trim().is_empty() {
                config.base_url = base_url;
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    fn validate(&mut self) -> Result<()> {
        url::Url::parse(&self.base_url)
            .with_context(|| format!("Invalid base_url: {}", self.base_url))?;
        self.base_url = self.base_url.trim_end_matches('/').to_string();
        Ok(())
    }

    /// Directory downloads are written to
    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
