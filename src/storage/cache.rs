//! Expiring cache of processed pages, keyed by URL.
//!
//! The cache never fails its callers: a broken backend reads as a miss and
//! a failed write is logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use crate::models::{Article, CacheConfig, StorageConfig};
use crate::storage::{Backend, MemoryBackend, build_backend};

const NAMESPACE: &str = "article";

pub struct ContentCache {
    backend: Arc<dyn Backend>,
    default_ttl: Duration,
}

impl ContentCache {
    pub fn new(backend: Arc<dyn Backend>, default_ttl: Duration) -> Self {
        Self {
            backend,
            default_ttl,
        }
    }

    pub fn in_memory(default_ttl: Duration) -> Self {
        Self::new(Arc::new(MemoryBackend::new()), default_ttl)
    }

    /// Build the configured backend stack under `{data_dir}/cache`.
    pub fn from_config(storage: &StorageConfig, cache: &CacheConfig) -> Self {
        Self::new(
            build_backend(storage, "cache"),
            Duration::from_secs(cache.ttl_secs),
        )
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Cached article for `url`, or `None` when absent, expired or unreadable.
    pub async fn get(&self, url: &str) -> Option<Article> {
        let raw = match self.backend.get(NAMESPACE, url).await {
            Ok(raw) => raw?,
            Err(e) => {
                log::warn!("Cache read failed for {}: {}", url, e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(article) => Some(article),
            Err(e) => {
                log::warn!("Discarding undecodable cache entry for {}: {}", url, e);
                None
            }
        }
    }

    /// Store `article` under `url` for `ttl`.
    pub async fn set(&self, url: &str, article: &Article, ttl: Duration) {
        let raw = match serde_json::to_string(article) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("Cache encode failed for {}: {}", url, e);
                return;
            }
        };
        if let Err(e) = self.backend.put(NAMESPACE, url, raw, Some(ttl)).await {
            log::warn!("Cache write failed for {}: {}", url, e);
        }
    }

    /// Store with the default TTL.
    pub async fn set_article(&self, url: &str, article: &Article) {
        self.set(url, article, self.default_ttl).await
    }
}
