// src/pipeline/monitor.rs

//! Monitor service wiring and the read path.
//!
//! [`Monitor`] owns the store, the cache, the content pipeline and the
//! refresher, and exposes the operations callers use: registration,
//! read-through parsing, change listing, and sweeps.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Article, ChangeEvent, Config, MonitoredSource, Subscriber};
use crate::pipeline::refresh::{Refresher, SweepReport};
use crate::services::{ContentPipeline, HttpPipeline, WebhookDispatcher, WebhookTransport};
use crate::storage::{ContentCache, MonitorStore};
use crate::utils::validate_http_url;

pub struct Monitor {
    store: Arc<MonitorStore>,
    cache: Arc<ContentCache>,
    pipeline: Arc<dyn ContentPipeline>,
    refresher: Arc<Refresher>,
}

impl Monitor {
    /// Wire storage, the HTTP pipeline and HTTP webhooks from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = Arc::new(MonitorStore::from_config(&config.storage));
        let cache = Arc::new(ContentCache::from_config(&config.storage, &config.cache));
        let pipeline: Arc<dyn ContentPipeline> = Arc::new(HttpPipeline::new(&config.fetcher));
        let dispatcher = Arc::new(WebhookDispatcher::http(store.clone(), &config.webhook)?);
        Ok(Self::assemble(store, cache, pipeline, dispatcher, config))
    }

    /// Wire explicit collaborators.
    pub fn with_parts(
        store: Arc<MonitorStore>,
        cache: Arc<ContentCache>,
        pipeline: Arc<dyn ContentPipeline>,
        transport: Arc<dyn WebhookTransport>,
        config: &Config,
    ) -> Self {
        let dispatcher = Arc::new(WebhookDispatcher::new(
            store.clone(),
            transport,
            &config.webhook,
        ));
        Self::assemble(store, cache, pipeline, dispatcher, config)
    }

    fn assemble(
        store: Arc<MonitorStore>,
        cache: Arc<ContentCache>,
        pipeline: Arc<dyn ContentPipeline>,
        dispatcher: Arc<WebhookDispatcher>,
        config: &Config,
    ) -> Self {
        let refresher = Arc::new(Refresher::new(
            store.clone(),
            cache.clone(),
            pipeline.clone(),
            dispatcher,
            &config.monitor,
        ));
        Self {
            store,
            cache,
            pipeline,
            refresher,
        }
    }

    pub fn store(&self) -> &MonitorStore {
        &self.store
    }

    pub fn refresher(&self) -> &Arc<Refresher> {
        &self.refresher
    }

    // --- Read path ---

    /// Cached article for `url`, fetching and caching it on a miss.
    pub async fn parse(&self, url: &str) -> Result<Article> {
        if let Some(article) = self.cache.get(url).await {
            log::debug!("Cache hit for {}", url);
            return Ok(article);
        }
        log::debug!("Cache miss for {}, fetching", url);
        let article = self.pipeline.fetch(url).await?;
        self.cache.set_article(url, &article).await;
        Ok(article)
    }

    /// Change events, optionally enriched with the cached current article.
    ///
    /// Same ordering as [`MonitorStore::list_change_events`].
    pub async fn list_changes(
        &self,
        limit: usize,
        since: Option<DateTime<Utc>>,
        include_article: bool,
    ) -> Result<Vec<ChangeEvent>> {
        let mut events = self.store.list_change_events(limit, since).await?;
        if include_article {
            for event in &mut events {
                event.current_article = self.cache.get(&event.url).await;
            }
        }
        Ok(events)
    }

    // --- Registration ---

    pub async fn register_source(&self, url: &str, kind: &str) -> Result<MonitoredSource> {
        validate_http_url(url)?;
        let source = MonitoredSource::new(url, kind);
        self.store.put_source(&source).await?;
        log::info!("Registered source {} ({})", source.id, source.url);
        Ok(source)
    }

    pub async fn unregister_source(&self, id: Uuid) -> Result<()> {
        self.store.delete_source(id).await?;
        log::info!("Unregistered source {}", id);
        Ok(())
    }

    pub async fn list_sources(&self) -> Result<Vec<MonitoredSource>> {
        self.store.list_sources().await
    }

    pub async fn subscribe(
        &self,
        callback_url: &str,
        url_prefix_filter: Option<String>,
    ) -> Result<Subscriber> {
        validate_http_url(callback_url)?;
        let subscriber = Subscriber::new(callback_url, url_prefix_filter);
        self.store.put_subscriber(&subscriber).await?;
        log::info!("Subscribed {} ({})", subscriber.id, subscriber.callback_url);
        Ok(subscriber)
    }

    pub async fn unsubscribe(&self, id: Uuid) -> Result<()> {
        self.store.delete_subscriber(id).await?;
        log::info!("Unsubscribed {}", id);
        Ok(())
    }

    pub async fn list_subscribers(&self) -> Result<Vec<Subscriber>> {
        self.store.get_all_subscribers().await
    }

    // --- Sweeps ---

    pub async fn sweep(&self) -> SweepReport {
        self.refresher.sweep().await
    }

    /// Run scheduled sweeps until `shutdown`, then release the pipeline.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        self.refresher.run_until(shutdown).await;
        self.shutdown().await;
    }

    /// Release pipeline resources.
    pub async fn shutdown(&self) {
        self.pipeline.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::DEFAULT_SOURCE_KIND;
    use crate::pipeline::testing::{RecordingTransport, ScriptedPipeline};
    use std::time::Duration;

    fn monitor() -> (Monitor, Arc<ScriptedPipeline>) {
        let pipeline = Arc::new(ScriptedPipeline::new());
        let monitor = Monitor::with_parts(
            Arc::new(MonitorStore::in_memory()),
            Arc::new(ContentCache::in_memory(Duration::from_secs(3600))),
            pipeline.clone(),
            Arc::new(RecordingTransport::default()),
            &Config::default(),
        );
        (monitor, pipeline)
    }

    #[tokio::test]
    async fn test_parse_reads_through_cache() {
        let (monitor, pipeline) = monitor();
        pipeline.serve("https://a.test/x", "X");

        let first = monitor.parse("https://a.test/x").await.unwrap();
        let second = monitor.parse("https://a.test/x").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(pipeline.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_parse_error_keeps_kind() {
        let (monitor, _pipeline) = monitor();
        let err = monitor.parse("https://a.test/missing").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FetchFailure);
    }

    #[tokio::test]
    async fn test_register_and_unregister() {
        let (monitor, _pipeline) = monitor();
        let source = monitor
            .register_source("https://a.test/x", DEFAULT_SOURCE_KIND)
            .await
            .unwrap();
        assert_eq!(source.last_checked_at, None);
        assert_eq!(source.last_content_hash, None);
        assert_eq!(monitor.list_sources().await.unwrap().len(), 1);

        monitor.unregister_source(source.id).await.unwrap();
        assert!(monitor.list_sources().await.unwrap().is_empty());

        assert!(monitor.register_source("not a url", "x").await.is_err());
    }

    #[tokio::test]
    async fn test_subscribe_defaults() {
        let (monitor, _pipeline) = monitor();
        let sub = monitor
            .subscribe("https://hooks.test/cb", Some("https://a.test".into()))
            .await
            .unwrap();
        assert_eq!(sub.failure_count, 0);
        assert!(sub.is_active);

        monitor.unsubscribe(sub.id).await.unwrap();
        assert!(monitor.list_subscribers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_changes_with_article() {
        let (monitor, pipeline) = monitor();
        let mut source = MonitoredSource::new("https://a.test/x", DEFAULT_SOURCE_KIND);
        source.last_content_hash = Some("old".into());
        monitor.store().put_source(&source).await.unwrap();
        pipeline.serve(&source.url, "New");
        monitor.sweep().await;

        let plain = monitor.list_changes(10, None, false).await.unwrap();
        assert_eq!(plain.len(), 1);
        assert!(plain[0].current_article.is_none());

        let enriched = monitor.list_changes(10, None, true).await.unwrap();
        assert_eq!(
            enriched[0].current_article.as_ref().map(|a| a.title()),
            Some("New")
        );

        // Enrichment is never written back.
        let again = monitor.store().list_change_events(10, None).await.unwrap();
        assert!(again[0].current_article.is_none());
    }

    #[tokio::test]
    async fn test_run_until_releases_pipeline() {
        let (monitor, pipeline) = monitor();
        monitor.run_until(async {}).await;
        assert_eq!(pipeline.shutdowns(), 1);
    }
}
