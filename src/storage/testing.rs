//! Test doubles for storage.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::storage::{Backend, MemoryBackend};

/// A memory backend that can be switched into a simulated outage.
#[derive(Default)]
pub struct OutageBackend {
    inner: MemoryBackend,
    down: AtomicBool,
}

impl OutageBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.down.load(Ordering::SeqCst) {
            Err(AppError::persistence("outage", "connection refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Backend for OutageBackend {
    fn name(&self) -> &'static str {
        "outage"
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        self.check()?;
        self.inner.get(namespace, key).await
    }

    async fn put(
        &self,
        namespace: &str,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.check()?;
        self.inner.put(namespace, key, value, ttl).await
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        self.check()?;
        self.inner.delete(namespace, key).await
    }

    async fn values(&self, namespace: &str) -> Result<Vec<String>> {
        self.check()?;
        self.inner.values(namespace).await
    }

    async fn append(&self, timeline: &str, score: f64, member: String) -> Result<()> {
        self.check()?;
        self.inner.append(timeline, score, member).await
    }

    async fn range_after(
        &self,
        timeline: &str,
        min_exclusive: f64,
        limit: usize,
    ) -> Result<Vec<String>> {
        self.check()?;
        self.inner.range_after(timeline, min_exclusive, limit).await
    }

    async fn latest(&self, timeline: &str, limit: usize) -> Result<Vec<String>> {
        self.check()?;
        self.inner.latest(timeline, limit).await
    }
}
