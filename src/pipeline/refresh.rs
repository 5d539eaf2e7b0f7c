// src/pipeline/refresh.rs

//! Periodic refresh of monitored sources.
//!
//! One sweep walks every source sequentially:
//!
//! 1. Skip sources checked less than `ttl` ago.
//! 2. Fetch through the content pipeline. A failure skips this source only.
//! 3. Classify the fetch against the stored fingerprint.
//! 4. Write the article to the content cache, whatever the outcome.
//! 5. Persist the advanced source.
//! 6. On a change, append the event and dispatch it to subscribers.
//!
//! Sweeps are single-flight: a trigger that arrives while one is running
//! returns immediately with [`SweepReport::skipped`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::Result;
use crate::models::{MonitorConfig, MonitoredSource};
use crate::pipeline::detect::{ChangeDetector, Detection};
use crate::services::{ContentPipeline, WebhookDispatcher};
use crate::storage::{ContentCache, MonitorStore};

/// Counts from one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Sources considered
    pub total: usize,
    /// Not due yet
    pub not_due: usize,
    /// Fetch, processing or persistence failures
    pub failed: usize,
    pub first_checks: usize,
    pub unchanged: usize,
    pub changed: usize,
    /// Another sweep was already running; nothing was done
    pub skipped_in_flight: bool,
}

impl SweepReport {
    /// Report for a trigger that found a sweep in flight.
    pub fn skipped() -> Self {
        Self {
            skipped_in_flight: true,
            ..Self::default()
        }
    }

    pub fn refreshed(&self) -> usize {
        self.first_checks + self.unchanged + self.changed
    }
}

/// Drives sweeps over the monitored sources.
pub struct Refresher {
    store: Arc<MonitorStore>,
    cache: Arc<ContentCache>,
    pipeline: Arc<dyn ContentPipeline>,
    dispatcher: Arc<WebhookDispatcher>,
    detector: ChangeDetector,
    ttl: chrono::Duration,
    interval: Duration,
    in_flight: Mutex<()>,
}

impl Refresher {
    pub fn new(
        store: Arc<MonitorStore>,
        cache: Arc<ContentCache>,
        pipeline: Arc<dyn ContentPipeline>,
        dispatcher: Arc<WebhookDispatcher>,
        config: &MonitorConfig,
    ) -> Self {
        Self {
            store,
            cache,
            pipeline,
            dispatcher,
            detector: ChangeDetector::new(),
            ttl: config.ttl(),
            interval: config.interval(),
            in_flight: Mutex::new(()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one sweep now.
    pub async fn sweep(&self) -> SweepReport {
        self.sweep_at(Utc::now()).await
    }

    /// Run one sweep, gating sources on `now`.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let Ok(_guard) = self.in_flight.try_lock() else {
            log::info!("Sweep already in progress, skipping trigger");
            return SweepReport::skipped();
        };

        let sources = match self.store.list_sources().await {
            Ok(sources) => sources,
            Err(e) => {
                log::error!("Sweep aborted, cannot list sources: {}", e);
                return SweepReport::default();
            }
        };

        log::info!("Sweep started over {} sources", sources.len());
        let mut report = SweepReport {
            total: sources.len(),
            ..SweepReport::default()
        };

        for source in sources {
            if !source.is_due(now, self.ttl) {
                log::debug!("Skipping {} (checked {:?})", source.url, source.last_checked_at);
                report.not_due += 1;
                continue;
            }

            match self.refresh_source(&source).await {
                Ok(Detection::FirstCheck { .. }) => report.first_checks += 1,
                Ok(Detection::Unchanged { .. }) => report.unchanged += 1,
                Ok(Detection::Changed { .. }) => report.changed += 1,
                Err(e) => {
                    log::warn!("Refresh failed for {} ({:?}): {}", source.url, e.kind(), e);
                    report.failed += 1;
                }
            }
        }

        log::info!(
            "Sweep finished: {} refreshed ({} changed, {} first checks, {} unchanged), {} not due, {} failed",
            report.refreshed(),
            report.changed,
            report.first_checks,
            report.unchanged,
            report.not_due,
            report.failed
        );
        report
    }

    /// Fetch, classify and persist one source.
    async fn refresh_source(&self, source: &MonitoredSource) -> Result<Detection> {
        let article = self.pipeline.fetch(&source.url).await?;
        let result = self.detector.apply(source, &article);

        self.cache.set_article(&source.url, &article).await;
        self.store.put_source(&result.source).await?;
        log::info!("{}: {}", source.url, result.detection.label());

        if let Some(event) = &result.event {
            self.store.append_change_event(event).await?;
            let report = self.dispatcher.dispatch(event).await;
            log::info!(
                "Change {} on {}: {} delivered, {} failed",
                event.id,
                event.url,
                report.delivered,
                report.failed
            );
        }

        Ok(result.detection)
    }

    /// Start a sweep in the background.
    pub fn trigger(self: &Arc<Self>) -> JoinHandle<SweepReport> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.sweep().await })
    }

    /// Sweep every interval until `shutdown` resolves.
    ///
    /// The first sweep runs one interval after start.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        log::info!("Scheduler started, interval {:?}", self.interval);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.sweep().await;
                }
            }
        }
        log::info!("Scheduler stopped");
    }

    /// Run the scheduler on its own task.
    pub fn spawn_scheduler<F>(self: &Arc<Self>, shutdown: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run_until(shutdown).await })
    }
}
