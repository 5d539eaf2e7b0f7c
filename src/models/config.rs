//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Sweep scheduling
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Webhook delivery behavior
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// HTTP fetching and extraction settings
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Record store backend selection
    #[serde(default)]
    pub storage: StorageConfig,

    /// Content cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Override selected values from the environment.
    pub fn apply_env_overrides(&mut self) {
        if let Some(secs) = env_u64("MONITOR_DEFAULT_TTL") {
            self.monitor.ttl_secs = secs;
        }
        if let Some(secs) = env_u64("REFRESH_INTERVAL_SECS") {
            self.monitor.interval_secs = secs;
        }
        if let Ok(dir) = std::env::var("PAGEWATCH_DATA_DIR") {
            if !dir.trim().is_empty() {
                self.storage.data_dir = PathBuf::from(dir);
            }
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.monitor.interval_secs == 0 {
            return Err(AppError::validation("monitor.interval_secs must be > 0"));
        }
        if self.webhook.timeout_secs == 0 {
            return Err(AppError::validation("webhook.timeout_secs must be > 0"));
        }
        if self.webhook.failure_threshold == 0 {
            return Err(AppError::validation(
                "webhook.failure_threshold must be > 0",
            ));
        }
        if self.webhook.max_concurrent == 0 {
            return Err(AppError::validation("webhook.max_concurrent must be > 0"));
        }
        if self.fetcher.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetcher.user_agent is empty"));
        }
        if self.fetcher.timeout_secs == 0 {
            return Err(AppError::validation("fetcher.timeout_secs must be > 0"));
        }
        if self.storage.backend == BackendKind::Local
            && self.storage.data_dir.as_os_str().is_empty()
        {
            return Err(AppError::validation("storage.data_dir is empty"));
        }
        Ok(())
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Sweep scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Minimum seconds between two refreshes of the same source
    #[serde(default = "defaults::ttl")]
    pub ttl_secs: u64,

    /// Seconds between scheduled sweeps
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,
}

impl MonitorConfig {
    /// Refresh TTL, saturating at the largest representable duration.
    pub fn ttl(&self) -> chrono::Duration {
        i64::try_from(self.ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            ttl_secs: defaults::ttl(),
            interval_secs: defaults::interval(),
        }
    }
}

/// Webhook delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Per-delivery timeout in seconds
    #[serde(default = "defaults::webhook_timeout")]
    pub timeout_secs: u64,

    /// Consecutive failures after which a subscriber is disabled
    #[serde(default = "defaults::failure_threshold")]
    pub failure_threshold: u32,

    /// Maximum deliveries in flight for one event
    #[serde(default = "defaults::webhook_concurrency")]
    pub max_concurrent: usize,
}

impl WebhookConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout_secs: defaults::webhook_timeout(),
            failure_threshold: defaults::failure_threshold(),
            max_concurrent: defaults::webhook_concurrency(),
        }
    }
}

/// HTTP fetching and extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// User-Agent header for page requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Page request timeout in seconds
    #[serde(default = "defaults::fetch_timeout")]
    pub timeout_secs: u64,

    /// Pages with more words than this are treated as articles
    #[serde(default = "defaults::article_min_words")]
    pub article_min_words: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::fetch_timeout(),
            article_min_words: defaults::article_min_words(),
        }
    }
}

/// Durable backend choice.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// JSON files under `data_dir`
    #[default]
    Local,
    /// Process memory only
    Memory,
}

/// Storage settings shared by the record store and the content cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: BackendKind,

    /// Root directory for the local backend
    #[serde(default = "defaults::data_dir")]
    pub data_dir: PathBuf,

    /// Fall back to memory when the durable backend fails
    #[serde(default = "defaults::fallback")]
    pub fallback: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            data_dir: defaults::data_dir(),
            fallback: defaults::fallback(),
        }
    }
}

/// Content cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Seconds a cached article stays readable
    #[serde(default = "defaults::cache_ttl")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: defaults::cache_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `debug`, `info`, `warn` or `error`
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Monitor defaults
    pub fn ttl() -> u64 {
        300
    }
    pub fn interval() -> u64 {
        300
    }

    // Webhook defaults
    pub fn webhook_timeout() -> u64 {
        10
    }
    pub fn failure_threshold() -> u32 {
        5
    }
    pub fn webhook_concurrency() -> usize {
        16
    }

    // Fetcher defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".into()
    }
    pub fn fetch_timeout() -> u64 {
        30
    }
    pub fn article_min_words() -> usize {
        200
    }

    // Storage defaults
    pub fn data_dir() -> PathBuf {
        PathBuf::from("storage")
    }
    pub fn fallback() -> bool {
        true
    }
    pub fn cache_ttl() -> u64 {
        86_400
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
