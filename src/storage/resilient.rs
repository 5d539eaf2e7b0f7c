//! Primary/fallback backend composition.
//!
//! Every call goes to the primary first. On a primary error, reads are
//! served from the fallback and writes land in the fallback instead. The
//! two backends diverge until the primary recovers; nothing reconciles them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::storage::Backend;

/// A backend that degrades to a fallback on primary errors.
pub struct Resilient {
    primary: Arc<dyn Backend>,
    fallback: Option<Arc<dyn Backend>>,
}

impl Resilient {
    /// Primary only: errors surface as persistence failures.
    pub fn new(primary: Arc<dyn Backend>) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    pub fn with_fallback(primary: Arc<dyn Backend>, fallback: Arc<dyn Backend>) -> Self {
        Self {
            primary,
            fallback: Some(fallback),
        }
    }

    /// Log the primary failure and hand back the backend to retry on.
    fn degrade(&self, op: &str, error: AppError) -> Result<&Arc<dyn Backend>> {
        match &self.fallback {
            Some(fallback) => {
                log::warn!(
                    "{} backend failed during {} ({}), using {} backend",
                    self.primary.name(),
                    op,
                    error,
                    fallback.name()
                );
                Ok(fallback)
            }
            None => Err(match error {
                e @ AppError::Persistence { .. } => e,
                other => AppError::persistence(self.primary.name(), other),
            }),
        }
    }
}

#[async_trait]
impl Backend for Resilient {
    fn name(&self) -> &'static str {
        "resilient"
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        match self.primary.get(namespace, key).await {
            Ok(value) => Ok(value),
            Err(e) => self.degrade("get", e)?.get(namespace, key).await,
        }
    }

    async fn put(
        &self,
        namespace: &str,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<()> {
        // Keep a copy for the fallback; the primary consumes the value.
        match self.primary.put(namespace, key, value.clone(), ttl).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.degrade("put", e)?
                    .put(namespace, key, value, ttl)
                    .await
            }
        }
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        match self.primary.delete(namespace, key).await {
            Ok(()) => Ok(()),
            Err(e) => self.degrade("delete", e)?.delete(namespace, key).await,
        }
    }

    async fn values(&self, namespace: &str) -> Result<Vec<String>> {
        match self.primary.values(namespace).await {
            Ok(values) => Ok(values),
            Err(e) => self.degrade("values", e)?.values(namespace).await,
        }
    }

    async fn append(&self, timeline: &str, score: f64, member: String) -> Result<()> {
        match self.primary.append(timeline, score, member.clone()).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.degrade("append", e)?
                    .append(timeline, score, member)
                    .await
            }
        }
    }

    async fn range_after(
        &self,
        timeline: &str,
        min_exclusive: f64,
        limit: usize,
    ) -> Result<Vec<String>> {
        match self.primary.range_after(timeline, min_exclusive, limit).await {
            Ok(members) => Ok(members),
            Err(e) => {
                self.degrade("range_after", e)?
                    .range_after(timeline, min_exclusive, limit)
                    .await
            }
        }
    }

    async fn latest(&self, timeline: &str, limit: usize) -> Result<Vec<String>> {
        match self.primary.latest(timeline, limit).await {
            Ok(members) => Ok(members),
            Err(e) => self.degrade("latest", e)?.latest(timeline, limit).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::storage::MemoryBackend;
    use crate::storage::testing::OutageBackend;

    fn stack() -> (Arc<OutageBackend>, Arc<MemoryBackend>, Resilient) {
        let primary = Arc::new(OutageBackend::new());
        let fallback = Arc::new(MemoryBackend::new());
        let resilient = Resilient::with_fallback(primary.clone(), fallback.clone());
        (primary, fallback, resilient)
    }

    #[tokio::test]
    async fn test_healthy_primary_takes_writes() {
        let (primary, fallback, resilient) = stack();
        resilient.put("ns", "k", "v".into(), None).await.unwrap();

        assert_eq!(primary.get("ns", "k").await.unwrap(), Some("v".into()));
        assert_eq!(fallback.get("ns", "k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_during_outage_is_readable_from_fallback() {
        let (primary, fallback, resilient) = stack();
        primary.set_down(true);

        resilient.put("ns", "k", "v".into(), None).await.unwrap();
        assert_eq!(fallback.get("ns", "k").await.unwrap(), Some("v".into()));
        assert_eq!(resilient.get("ns", "k").await.unwrap(), Some("v".into()));
    }

    #[tokio::test]
    async fn test_backends_diverge_after_recovery() {
        let (primary, _fallback, resilient) = stack();
        primary.set_down(true);
        resilient.put("ns", "k", "v".into(), None).await.unwrap();

        primary.set_down(false);
        // The write only reached the fallback.
        assert_eq!(resilient.get("ns", "k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_timeline_falls_back() {
        let (primary, _fallback, resilient) = stack();
        primary.set_down(true);

        resilient.append("t", 1.0, "a".into()).await.unwrap();
        resilient.append("t", 2.0, "b".into()).await.unwrap();
        assert_eq!(resilient.latest("t", 5).await.unwrap(), vec!["b", "a"]);
        assert_eq!(resilient.range_after("t", 1.0, 5).await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_no_fallback_surfaces_persistence_error() {
        let primary = Arc::new(OutageBackend::new());
        primary.set_down(true);
        let resilient = Resilient::new(primary);

        let err = resilient.get("ns", "k").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PersistenceFailure);
    }
}
