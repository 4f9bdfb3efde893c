//! Runtime configuration: an optional TOML file layered over built-in defaults.
//!
//! Lookup order for the file: `--config <path>`, then `<data_dir>/swipe.toml`.
//! The data directory is `$SWIPE_DATA_DIR`, falling back to `~/.swipe`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use swipe_core::{CATALOG_TTL_MS, MAX_MEDIA_ATTEMPTS, RECENTLY_SERVED_CAPACITY};
use swipe_core::constants::MEDIA_RESULT_LIMIT;

pub const DATA_DIR_ENV: &str = "SWIPE_DATA_DIR";
pub const CONFIG_FILE_NAME: &str = "swipe.toml";
pub const CATALOG_FILE_NAME: &str = "popular_character_tags.json";
pub const DB_FILE_NAME: &str = "preferences.db";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Socket address for `swipe serve`.
    pub bind: String,
    /// Character snapshot. Defaults to `<data_dir>/popular_character_tags.json`.
    pub catalog_path: Option<PathBuf>,
    /// Preference database. Defaults to `<data_dir>/preferences.db`.
    pub db_path: Option<PathBuf>,
    pub cache_ttl_secs: u64,
    pub recently_served_capacity: usize,
    /// Total media lookups per single-character request.
    pub max_media_attempts: usize,
    pub default_batch_count: usize,
    pub max_batch_count: usize,
    pub default_page_limit: usize,
    pub max_page_limit: usize,
    /// Browser origins allowed by CORS. Requests without an Origin header
    /// are always served.
    pub cors_origins: Vec<String>,
    pub media: MediaConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MediaConfig {
    /// Booru-style JSON post index endpoint.
    pub base_url: String,
    pub timeout_secs: u64,
    pub result_limit: usize,
    /// Choose among the N best-scored posts. Unset means all returned posts.
    pub top_n: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3001".to_string(),
            catalog_path: None,
            db_path: None,
            cache_ttl_secs: CATALOG_TTL_MS / 1000,
            recently_served_capacity: RECENTLY_SERVED_CAPACITY,
            max_media_attempts: MAX_MEDIA_ATTEMPTS,
            default_batch_count: 5,
            max_batch_count: 50,
            default_page_limit: 10,
            max_page_limit: 100,
            cors_origins: vec!["http://localhost:5173".to_string()],
            media: MediaConfig::default(),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.rule34.xxx/index.php".to_string(),
            timeout_secs: 10,
            result_limit: MEDIA_RESULT_LIMIT,
            top_n: None,
        }
    }
}

impl MediaConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load from an explicit path, or from `<data_dir>/swipe.toml` if present,
    /// or fall back to defaults.
    pub fn load(explicit: Option<&Path>, data_dir: &Path) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = data_dir.join(CONFIG_FILE_NAME);
                if path.is_file() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        tracing::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_media_attempts == 0 {
            bail!("max_media_attempts must be at least 1");
        }
        if self.max_batch_count == 0 || self.max_page_limit == 0 {
            bail!("max_batch_count and max_page_limit must be at least 1");
        }
        if self.media.timeout_secs == 0 {
            bail!("media.timeout_secs must be at least 1");
        }
        Ok(())
    }

    pub fn cache_ttl_ms(&self) -> u64 {
        self.cache_ttl_secs.saturating_mul(1000)
    }

    pub fn catalog_path(&self, data_dir: &Path) -> PathBuf {
        self.catalog_path
            .clone()
            .unwrap_or_else(|| data_dir.join(CATALOG_FILE_NAME))
    }

    pub fn db_path(&self, data_dir: &Path) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| data_dir.join(DB_FILE_NAME))
    }
}

/// `$SWIPE_DATA_DIR`, or `~/.swipe`.
pub fn data_dir() -> PathBuf {
    std::env::var(DATA_DIR_ENV)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir().join(".swipe"))
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}
