use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::rates::ProviderName;

fn default_read_retries() -> u32 {
    3
}

fn default_batch_size() -> u32 {
    30
}

/// Settings for interactive rate resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RatesConfig {
    /// Provider used when resolving cache misses.
    pub provider: ProviderName,

    /// Transport-level retries per request.
    pub read_retries: u32,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            provider: ProviderName::OpenExchangeRates,
            read_retries: default_read_retries(),
        }
    }
}

/// Defaults for batch backfill runs. Command-line flags override these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Providers to try, in priority order.
    pub providers: Vec<ProviderName>,

    /// Days downloaded per staging batch.
    pub batch_size: u32,

    /// Seconds to sleep between batches.
    pub read_delay: u64,

    /// Transport-level retries per request.
    pub read_retries: u32,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            providers: vec![ProviderName::OpenExchangeRates],
            batch_size: default_batch_size(),
            read_delay: 0,
            read_retries: default_read_retries(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default rate store path. If relative, resolved from the config file
    /// location by the caller.
    pub store_path: Option<PathBuf>,

    /// Rate resolution settings.
    pub rates: RatesConfig,

    /// Backfill settings.
    pub download: DownloadConfig,
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load config from a file, or return default config if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Returns the default config file path.
///
/// Resolution order:
/// 1. `./ratebook.toml` if it exists in current directory
/// 2. `~/.local/share/ratebook/ratebook.toml` (XDG data directory)
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from("ratebook.toml");
    if local_config.exists() {
        return local_config;
    }

    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join("ratebook").join("ratebook.toml");
    }

    local_config
}
