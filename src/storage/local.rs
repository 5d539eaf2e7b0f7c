//! Local filesystem backend.
//!
//! The durable backend: every document is a JSON file written atomically
//! (write to temp, then rename).
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── {namespace}/
//! │   └── {key}.json        # {"expires_at": ..., "value": ...}
//! └── {timeline}.json       # [{"score": ..., "member": ...}, ...] ascending
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::Backend;

/// A stored document with optional expiry.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    value: Value,
}

impl Envelope {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TimelineEntry {
    score: f64,
    member: Value,
}

/// Local filesystem backend.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root_dir: PathBuf,
}

impl LocalBackend {
    /// Create a new LocalBackend rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Relative path of a keyed document.
    fn record_key(namespace: &str, key: &str) -> String {
        format!("{}/{}.json", file_stem(namespace), file_stem(key))
    }

    fn timeline_key(timeline: &str) -> String {
        format!("{}.json", file_stem(timeline))
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::persistence("local", e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Remove a file, treating a missing one as already removed.
    async fn remove_path(&self, path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::persistence("local", e)),
        }
    }

    /// Live documents of a namespace. Expired documents are deleted on the way.
    async fn scan(&self, namespace: &str) -> Result<Vec<Value>> {
        let dir = self.path(&file_stem(namespace));
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::persistence("local", e)),
        };

        let now = Utc::now();
        let mut values = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                // Removed concurrently
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(AppError::persistence("local", e)),
            };
            match serde_json::from_slice::<Envelope>(&bytes) {
                Ok(env) if env.is_live(now) => values.push(env.value),
                Ok(_) => self.remove_path(&path).await?,
                Err(e) => log::warn!("Skipping unreadable record {}: {}", path.display(), e),
            }
        }
        Ok(values)
    }

    async fn read_timeline(&self, timeline: &str) -> Result<Vec<TimelineEntry>> {
        Ok(self
            .read_json(&Self::timeline_key(timeline))
            .await?
            .unwrap_or_default())
    }
}

/// Map an arbitrary key onto a safe file name.
///
/// Keys made of `[A-Za-z0-9_-]` are kept as-is; anything else (URLs) is
/// replaced by its SHA-256 digest.
fn file_stem(key: &str) -> String {
    let safe = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if safe {
        key.to_string()
    } else {
        format!("h_{}", hex::encode(Sha256::digest(key.as_bytes())))
    }
}

fn to_value(raw: &str) -> Result<Value> {
    Ok(serde_json::from_str(raw)?)
}

#[async_trait]
impl Backend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let record = Self::record_key(namespace, key);
        let envelope: Option<Envelope> = self.read_json(&record).await?;
        match envelope {
            Some(env) if env.is_live(Utc::now()) => Ok(Some(serde_json::to_string(&env.value)?)),
            Some(_) => {
                self.remove_path(&self.path(&record)).await?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(
        &self,
        namespace: &str,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<()> {
        // A TTL beyond the calendar range never expires.
        let expires_at = ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .and_then(|ttl| Utc::now().checked_add_signed(ttl));
        let envelope = Envelope {
            expires_at,
            value: to_value(&value)?,
        };
        self.write_json(&Self::record_key(namespace, key), &envelope)
            .await?;

        // Namespaces with expiring documents are swept on every write.
        if ttl.is_some() {
            if let Err(e) = self.scan(namespace).await {
                log::warn!("Expiry sweep of {} failed: {}", namespace, e);
            }
        }
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        self.remove_path(&self.path(&Self::record_key(namespace, key)))
            .await
    }

    async fn values(&self, namespace: &str) -> Result<Vec<String>> {
        self.scan(namespace)
            .await?
            .iter()
            .map(|v| serde_json::to_string(v).map_err(AppError::from))
            .collect()
    }

    async fn append(&self, timeline: &str, score: f64, member: String) -> Result<()> {
        let mut entries = self.read_timeline(timeline).await?;
        let pos = entries.partition_point(|e| e.score <= score);
        entries.insert(
            pos,
            TimelineEntry {
                score,
                member: to_value(&member)?,
            },
        );
        self.write_json(&Self::timeline_key(timeline), &entries)
            .await
    }

    async fn range_after(
        &self,
        timeline: &str,
        min_exclusive: f64,
        limit: usize,
    ) -> Result<Vec<String>> {
        self.read_timeline(timeline)
            .await?
            .iter()
            .filter(|e| e.score > min_exclusive)
            .take(limit)
            .map(|e| serde_json::to_string(&e.member).map_err(AppError::from))
            .collect()
    }

    async fn latest(&self, timeline: &str, limit: usize) -> Result<Vec<String>> {
        self.read_timeline(timeline)
            .await?
            .iter()
            .rev()
            .take(limit)
            .map(|e| serde_json::to_string(&e.member).map_err(AppError::from))
            .collect()
    }
}
