//! Record store for sources, change events and subscribers.
//!
//! Every method takes and returns detached values; callers mutate their
//! copy and write it back to persist.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{ChangeEvent, MonitoredSource, StorageConfig, Subscriber, timestamp_score};
use crate::storage::{Backend, MemoryBackend, build_backend};

const SOURCES: &str = "monitor";
const SUBSCRIBERS: &str = "subscriber";
const TIMELINE: &str = "events_timeline";

/// Half of the timeline's score resolution.
const HALF_MICRO: f64 = 0.000_000_5;

/// Typed access to monitor records over any [`Backend`].
#[derive(Clone)]
pub struct MonitorStore {
    backend: Arc<dyn Backend>,
}

impl MonitorStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// A store that lives only in process memory.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Build the configured backend stack under `{data_dir}/records`.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(build_backend(config, "records"))
    }

    // --- MonitoredSource ---

    /// Insert or overwrite a source.
    pub async fn put_source(&self, source: &MonitoredSource) -> Result<()> {
        self.put(SOURCES, &source.id.to_string(), source).await
    }

    pub async fn get_source(&self, id: Uuid) -> Result<Option<MonitoredSource>> {
        self.get(SOURCES, &id.to_string()).await
    }

    /// All sources, order unspecified.
    pub async fn list_sources(&self) -> Result<Vec<MonitoredSource>> {
        self.values(SOURCES).await
    }

    pub async fn delete_source(&self, id: Uuid) -> Result<()> {
        self.backend.delete(SOURCES, &id.to_string()).await
    }

    // --- ChangeEvent ---

    /// Append an event to the timeline. Read-path enrichment is never stored.
    pub async fn append_change_event(&self, event: &ChangeEvent) -> Result<()> {
        let mut stored = event.clone();
        stored.current_article = None;
        let member = serde_json::to_string(&stored)?;
        self.backend.append(TIMELINE, event.score(), member).await
    }

    /// List change events.
    ///
    /// With `since`, returns up to `limit` events strictly after it, oldest
    /// first. Without, returns the `limit` most recent events, newest first.
    pub async fn list_change_events(
        &self,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ChangeEvent>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        match since {
            Some(since) => self.events_after(since, limit).await,
            None => {
                let raw = self.backend.latest(TIMELINE, limit).await?;
                Ok(decode_all(raw, "change event"))
            }
        }
    }

    /// Events strictly after `since`, oldest first.
    ///
    /// Scores only resolve microseconds, so the range starts at the floor of
    /// `since` and the exact comparison runs on the decoded timestamps. The
    /// window widens until `limit` events pass or the timeline runs out.
    async fn events_after(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<ChangeEvent>> {
        let floor = timestamp_score(since) - HALF_MICRO;
        let mut window = limit;
        loop {
            let raw = self.backend.range_after(TIMELINE, floor, window).await?;
            let exhausted = raw.len() < window;
            let events: Vec<ChangeEvent> = decode_all(raw, "change event")
                .into_iter()
                .filter(|e: &ChangeEvent| e.detected_at > since)
                .take(limit)
                .collect();
            if events.len() == limit || exhausted {
                return Ok(events);
            }
            window = window.saturating_mul(2);
        }
    }

    // --- Subscriber ---

    /// Insert or overwrite a subscriber.
    pub async fn put_subscriber(&self, subscriber: &Subscriber) -> Result<()> {
        self.put(SUBSCRIBERS, &subscriber.id.to_string(), subscriber)
            .await
    }

    pub async fn get_all_subscribers(&self) -> Result<Vec<Subscriber>> {
        self.values(SUBSCRIBERS).await
    }

    pub async fn delete_subscriber(&self, id: Uuid) -> Result<()> {
        self.backend.delete(SUBSCRIBERS, &id.to_string()).await
    }

    // --- helpers ---

    async fn put<T: Serialize>(&self, namespace: &str, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.backend.put(namespace, key, raw, None).await
    }

    async fn get<T: DeserializeOwned>(&self, namespace: &str, key: &str) -> Result<Option<T>> {
        match self.backend.get(namespace, key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn values<T: DeserializeOwned>(&self, namespace: &str) -> Result<Vec<T>> {
        let raw = self.backend.values(namespace).await?;
        Ok(decode_all(raw, namespace))
    }
}

/// Decode records, skipping (and logging) the ones that no longer parse.
fn decode_all<T: DeserializeOwned>(raw: Vec<String>, what: &str) -> Vec<T> {
    raw.into_iter()
        .filter_map(|r| match serde_json::from_str(&r) {
            Ok(v) => Some(v),
            Err(e) => {
                log::warn!("Skipping corrupt {} record: {}", what, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_SOURCE_KIND;
    use crate::storage::Resilient;
    use crate::storage::testing::OutageBackend;
    use chrono::{Duration, TimeZone};

    fn event_at(ts: DateTime<Utc>, new_hash: &str) -> ChangeEvent {
        ChangeEvent::content_updated("https://example.com/a", None, ts, None, new_hash)
    }

    #[tokio::test]
    async fn test_source_crud() {
        let store = MonitorStore::in_memory();
        let mut source = MonitoredSource::new("https://example.com", DEFAULT_SOURCE_KIND);
        store.put_source(&source).await.unwrap();

        source.last_content_hash = Some("h1".into());
        store.put_source(&source).await.unwrap();

        let all = store.list_sources().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].last_content_hash.as_deref(), Some("h1"));
        assert_eq!(store.get_source(source.id).await.unwrap(), Some(source.clone()));

        store.delete_source(source.id).await.unwrap();
        assert!(store.list_sources().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_event_listing_asymmetry() {
        let store = MonitorStore::in_memory();
        let t = Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap();
        for (offset, name) in [(-1, "t-1"), (0, "t"), (1, "t+1"), (2, "t+2")] {
            store
                .append_change_event(&event_at(t + Duration::seconds(offset), name))
                .await
                .unwrap();
        }

        let since: Vec<_> = store
            .list_change_events(50, Some(t))
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.new_hash)
            .collect();
        assert_eq!(since, vec!["t+1", "t+2"]);

        let recent: Vec<_> = store
            .list_change_events(2, None)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.new_hash)
            .collect();
        assert_eq!(recent, vec!["t+2", "t+1"]);
    }

    #[tokio::test]
    async fn test_since_caps_oldest_first() {
        let store = MonitorStore::in_memory();
        let t = Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap();
        for i in 1..=5 {
            store
                .append_change_event(&event_at(t + Duration::seconds(i), &i.to_string()))
                .await
                .unwrap();
        }

        let events = store.list_change_events(2, Some(t)).await.unwrap();
        let hashes: Vec<_> = events.iter().map(|e| e.new_hash.as_str()).collect();
        assert_eq!(hashes, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_since_compares_below_score_resolution() {
        let store = MonitorStore::in_memory();
        let t = Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap();
        store.append_change_event(&event_at(t, "at")).await.unwrap();
        store
            .append_change_event(&event_at(t + Duration::nanoseconds(500), "after"))
            .await
            .unwrap();
        store
            .append_change_event(&event_at(t + Duration::seconds(1), "later"))
            .await
            .unwrap();

        let hashes = |events: Vec<ChangeEvent>| -> Vec<String> {
            events.into_iter().map(|e| e.new_hash).collect()
        };
        assert_eq!(
            hashes(store.list_change_events(10, Some(t)).await.unwrap()),
            vec!["after", "later"]
        );
        // The event sharing the cut-off microsecond does not use up the limit.
        assert_eq!(
            hashes(store.list_change_events(1, Some(t + Duration::nanoseconds(200))).await.unwrap()),
            vec!["after"]
        );
    }

    #[tokio::test]
    async fn test_out_of_order_appends_are_sorted() {
        let store = MonitorStore::in_memory();
        let t = Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap();
        store.append_change_event(&event_at(t + Duration::seconds(5), "late")).await.unwrap();
        store.append_change_event(&event_at(t, "early")).await.unwrap();

        let events = store.list_change_events(10, Some(t - Duration::seconds(1))).await.unwrap();
        assert_eq!(events[0].new_hash, "early");
        assert_eq!(events[1].new_hash, "late");
    }

    #[tokio::test]
    async fn test_enrichment_is_not_persisted() {
        let store = MonitorStore::in_memory();
        let t = Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap();
        let mut event = event_at(t, "h");
        event.current_article = Some(crate::models::Article::GeneralPage(
            crate::models::GeneralPageRecord {
                url: event.url.clone(),
                title: "x".into(),
                description: None,
                headlines: vec![],
                links: vec![],
                topics: vec![],
                word_count: 0,
                fetched_at: t,
            },
        ));
        store.append_change_event(&event).await.unwrap();

        let stored = store.list_change_events(1, None).await.unwrap();
        assert!(stored[0].current_article.is_none());
    }

    #[tokio::test]
    async fn test_subscriber_crud() {
        let store = MonitorStore::in_memory();
        let mut sub = Subscriber::new("https://hook.test", None);
        store.put_subscriber(&sub).await.unwrap();

        sub.failure_count = 3;
        store.put_subscriber(&sub).await.unwrap();
        let all = store.get_all_subscribers().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].failure_count, 3);

        store.delete_subscriber(sub.id).await.unwrap();
        assert!(store.get_all_subscribers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_outage_write_then_read_uses_fallback() {
        let primary = Arc::new(OutageBackend::new());
        let backend = Resilient::with_fallback(primary.clone(), Arc::new(MemoryBackend::new()));
        let store = MonitorStore::new(Arc::new(backend));

        primary.set_down(true);
        let source = MonitoredSource::new("https://example.com", DEFAULT_SOURCE_KIND);
        store.put_source(&source).await.unwrap();

        let all = store.list_sources().await.unwrap();
        assert_eq!(all, vec![source]);
    }

    #[tokio::test]
    async fn test_corrupt_records_are_skipped() {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .put(SOURCES, "bad", "{\"nope\":true}".into(), None)
            .await
            .unwrap();
        let store = MonitorStore::new(backend);
        let good = MonitoredSource::new("https://example.com", DEFAULT_SOURCE_KIND);
        store.put_source(&good).await.unwrap();

        assert_eq!(store.list_sources().await.unwrap(), vec![good]);
    }
}
