//! In-memory backend.
//!
//! Used on its own for ephemeral runs and as the fallback under a durable
//! backend. Locks are held only for the synchronous map update.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::storage::Backend;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

#[derive(Debug, Default)]
struct State {
    records: HashMap<String, HashMap<String, Entry>>,
    timelines: HashMap<String, Vec<(f64, String)>>,
}

/// Process-local backend.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| AppError::persistence("memory", "state lock poisoned"))
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let mut state = self.lock()?;
        let Some(ns) = state.records.get_mut(namespace) else {
            return Ok(None);
        };
        if let Some(entry) = ns.get(key) {
            if entry.is_live(Instant::now()) {
                return Ok(Some(entry.value.clone()));
            }
            ns.remove(key);
        }
        Ok(None)
    }

    async fn put(
        &self,
        namespace: &str,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let mut state = self.lock()?;
        let now = Instant::now();
        // A TTL too large for the clock never expires.
        let expires_at = ttl.and_then(|ttl| now.checked_add(ttl));
        let ns = state.records.entry(namespace.to_string()).or_default();
        if ttl.is_some() {
            ns.retain(|_, entry| entry.is_live(now));
        }
        ns.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        let mut state = self.lock()?;
        if let Some(ns) = state.records.get_mut(namespace) {
            ns.remove(key);
        }
        Ok(())
    }

    async fn values(&self, namespace: &str) -> Result<Vec<String>> {
        let mut state = self.lock()?;
        let now = Instant::now();
        Ok(state
            .records
            .get_mut(namespace)
            .map(|ns| {
                ns.retain(|_, entry| entry.is_live(now));
                ns.values().map(|entry| entry.value.clone()).collect()
            })
            .unwrap_or_default())
    }

    async fn append(&self, timeline: &str, score: f64, member: String) -> Result<()> {
        let mut state = self.lock()?;
        let entries = state.timelines.entry(timeline.to_string()).or_default();
        // Insert after every entry with an equal score.
        let pos = entries.partition_point(|(s, _)| *s <= score);
        entries.insert(pos, (score, member));
        Ok(())
    }

    async fn range_after(
        &self,
        timeline: &str,
        min_exclusive: f64,
        limit: usize,
    ) -> Result<Vec<String>> {
        let state = self.lock()?;
        Ok(state
            .timelines
            .get(timeline)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(s, _)| *s > min_exclusive)
                    .take(limit)
                    .map(|(_, m)| m.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn latest(&self, timeline: &str, limit: usize) -> Result<Vec<String>> {
        let state = self.lock()?;
        Ok(state
            .timelines
            .get(timeline)
            .map(|entries| {
                entries
                    .iter()
                    .rev()
                    .take(limit)
                    .map(|(_, m)| m.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}
