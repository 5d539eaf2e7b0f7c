//! Storage abstractions for monitor records and cached content.
//!
//! Both the record store and the content cache sit on the same
//! [`Backend`] capability: a keyed set of JSON documents plus a
//! score-ordered timeline. [`Resilient`] layers a fallback backend under a
//! primary one and implements the degrade-on-error policy once.
//!
//! ## Directory Structure (local backend)
//!
//! ```text
//! storage/
//! ├── records/
//! │   ├── monitor/{id}.json        # MonitoredSource
//! │   ├── subscriber/{id}.json     # Subscriber
//! │   └── events_timeline.json     # ChangeEvent timeline
//! └── cache/
//!     └── article/{key}.json       # Article with expiry
//! ```

pub mod cache;
pub mod local;
pub mod memory;
pub mod resilient;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{BackendKind, StorageConfig};

// Re-export for convenience
pub use cache::ContentCache;
pub use local::LocalBackend;
pub use memory::MemoryBackend;
pub use resilient::Resilient;
pub use store::MonitorStore;

/// Keyed documents plus ordered timelines, stored as JSON strings.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short backend name for logs and errors.
    fn name(&self) -> &'static str;

    /// Read one document. Expired entries read as `None`.
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>>;

    /// Insert or overwrite one document.
    async fn put(
        &self,
        namespace: &str,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<()>;

    /// Remove one document. Missing keys are not an error.
    async fn delete(&self, namespace: &str, key: &str) -> Result<()>;

    /// All live documents in a namespace, order unspecified.
    async fn values(&self, namespace: &str) -> Result<Vec<String>>;

    /// Add a member to a timeline. Equal scores keep insertion order.
    async fn append(&self, timeline: &str, score: f64, member: String) -> Result<()>;

    /// Members with score strictly greater than `min_exclusive`, ascending, at most `limit`.
    async fn range_after(
        &self,
        timeline: &str,
        min_exclusive: f64,
        limit: usize,
    ) -> Result<Vec<String>>;

    /// The `limit` highest-scored members, descending.
    async fn latest(&self, timeline: &str, limit: usize) -> Result<Vec<String>>;
}

/// Build the backend stack for one storage area (`records`, `cache`).
pub fn build_backend(config: &StorageConfig, area: &str) -> Arc<dyn Backend> {
    match config.backend {
        BackendKind::Memory => Arc::new(MemoryBackend::new()),
        BackendKind::Local => {
            let primary: Arc<dyn Backend> = Arc::new(LocalBackend::new(config.data_dir.join(area)));
            if config.fallback {
                Arc::new(Resilient::with_fallback(
                    primary,
                    Arc::new(MemoryBackend::new()),
                ))
            } else {
                primary
            }
        }
    }
}
