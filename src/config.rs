//! Configuration file parser for ~/.config/gstv/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted but logged, since they are usually typos.
use crate::api::ClientSettings;
use crate::feed::{CategoryTable, FeedSettings};
use crate::util::derive_device_id;
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Env var that overrides `api_token`.
pub const TOKEN_ENV: &str = "GSTV_API_TOKEN";

const KNOWN_KEYS: &[&str] = &[
    "api_base_url",
    "detail_path",
    "site_url",
    "user_id",
    "device_id",
    "api_token",
    "duplicate_threshold",
    "retry_delay_ms",
    "initial_retries",
    "request_timeout_secs",
    "scroll_proximity",
    "category_ids",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

/// Application configuration.
///
/// Every key is optional. `api_token` is masked in Debug output.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend root, e.g. `https://backend2.gstv.in`.
    pub api_base_url: String,

    /// Article detail endpoint, relative to `api_base_url`.
    pub detail_path: String,

    /// Public site root, used for canonical links.
    pub site_url: String,

    pub user_id: String,

    /// Derived from host and user name when absent.
    pub device_id: Option<String>,

    /// Bearer token. `GSTV_API_TOKEN` takes precedence.
    pub api_token: Option<String>,

    /// Consecutive duplicate-only responses before the feed stops.
    pub duplicate_threshold: u32,

    pub retry_delay_ms: u64,

    /// Transport retries when loading the first article.
    pub initial_retries: u32,

    pub request_timeout_secs: u64,

    /// Remaining lines below the viewport that trigger the next load.
    pub scroll_proximity: u16,

    /// Extra or replacement entries for the section -> category id table.
    pub category_ids: HashMap<String, Vec<i64>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "https://backend2.gstv.in".to_string(),
            detail_path: "api/news/detail".to_string(),
            site_url: "https://www.gstv.in/".to_string(),
            user_id: "guest".to_string(),
            device_id: None,
            api_token: None,
            duplicate_threshold: 2,
            retry_delay_ms: 2000,
            initial_retries: 3,
            request_timeout_secs: 20,
            scroll_proximity: 3,
            category_ids: HashMap::new(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_base_url", &self.api_base_url)
            .field("detail_path", &self.detail_path)
            .field("site_url", &self.site_url)
            .field("user_id", &self.user_id)
            .field("device_id", &self.device_id)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .field("duplicate_threshold", &self.duplicate_threshold)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("initial_retries", &self.initial_retries)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("scroll_proximity", &self.scroll_proximity)
            .field("category_ids", &self.category_ids)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// `~/.config/gstv/config.toml`, if `HOME` is set.
    pub fn default_path() -> Option<PathBuf> {
        let home = std::env::var_os("HOME")?;
        Some(
            PathBuf::from(home)
                .join(".config")
                .join("gstv")
                .join("config.toml"),
        )
    }

    /// Load configuration from a TOML file.
    ///
    /// - Missing or empty file -> `Ok(Config::default())`
    /// - Invalid TOML -> `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys -> accepted, logged as a warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            api = %config.api_base_url,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// API token, preferring the environment over the file.
    pub fn token(&self) -> Option<SecretString> {
        self.token_with_env(std::env::var(TOKEN_ENV).ok())
    }

    fn token_with_env(&self, env: Option<String>) -> Option<SecretString> {
        env.filter(|t| !t.trim().is_empty())
            .or_else(|| self.api_token.clone().filter(|t| !t.trim().is_empty()))
            .map(SecretString::from)
    }

    pub fn client_settings(&self) -> ClientSettings {
        let device_id = self
            .device_id
            .clone()
            .filter(|d| !d.is_empty())
            .unwrap_or_else(derive_device_id);

        ClientSettings {
            base_url: self.api_base_url.clone(),
            detail_path: self.detail_path.clone(),
            user_id: self.user_id.clone(),
            device_id,
            token: self.token(),
            timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
        }
    }

    /// Feed tunables. Out-of-range values are clamped with a warning.
    pub fn feed_settings(&self) -> FeedSettings {
        let duplicate_threshold = if self.duplicate_threshold == 0 {
            tracing::warn!("duplicate_threshold must be at least 1, using 1");
            1
        } else {
            self.duplicate_threshold
        };

        let site_url = match Url::parse(&self.site_url) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(site_url = %self.site_url, error = %e, "Ignoring invalid site_url");
                None
            }
        };

        FeedSettings {
            duplicate_threshold,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            initial_retries: self.initial_retries,
            site_url,
            categories: CategoryTable::builtin().with_overrides(&self.category_ids),
            ..FeedSettings::default()
        }
    }
}
