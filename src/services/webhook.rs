// src/services/webhook.rs

//! Webhook fan-out with per-subscriber circuit-breaking.
//!
//! One event is delivered to every matching active subscriber
//! concurrently, bounded by `max_concurrent`. Each delivery is independent:
//! a slow or failing endpoint only affects its own subscriber record.
//! Nothing is retried within a dispatch; the failure counter carries over
//! to later events instead.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use crate::error::{AppError, Result};
use crate::models::{ChangeEvent, Subscriber, WebhookConfig};
use crate::pipeline::circuit_breaker::{CircuitBreaker, CircuitBreakerResult};
use crate::storage::MonitorStore;
use crate::utils::http::create_webhook_client;

/// Outbound delivery of one event to one callback URL.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn deliver(&self, callback_url: &str, event: &ChangeEvent) -> Result<()>;
}

/// JSON POST over reqwest. Any non-2xx response is a failure.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: create_webhook_client(timeout)?,
        })
    }
}

#[async_trait]
impl WebhookTransport for HttpTransport {
    async fn deliver(&self, callback_url: &str, event: &ChangeEvent) -> Result<()> {
        let response = self
            .client
            .post(callback_url)
            .json(&event.payload())
            .send()
            .await
            .map_err(|e| AppError::delivery(callback_url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::delivery(
                callback_url,
                format!("responded with status {}", status.as_u16()),
            ));
        }
        Ok(())
    }
}

/// Counts from one dispatch call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub matched: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Subscribers deactivated by this dispatch
    pub disabled: usize,
}

/// Delivers change events to subscribers.
pub struct WebhookDispatcher {
    store: Arc<MonitorStore>,
    transport: Arc<dyn WebhookTransport>,
    breaker: CircuitBreaker,
    timeout: Duration,
    max_concurrent: usize,
}

impl WebhookDispatcher {
    pub fn new(
        store: Arc<MonitorStore>,
        transport: Arc<dyn WebhookTransport>,
        config: &WebhookConfig,
    ) -> Self {
        Self {
            store,
            transport,
            breaker: CircuitBreaker::with_threshold(config.failure_threshold),
            timeout: config.timeout(),
            max_concurrent: config.max_concurrent.max(1),
        }
    }

    /// Dispatcher that POSTs over HTTP.
    pub fn http(store: Arc<MonitorStore>, config: &WebhookConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(config.timeout())?);
        Ok(Self::new(store, transport, config))
    }

    /// Deliver `event` to every matching subscriber. Never fails.
    pub async fn dispatch(&self, event: &ChangeEvent) -> DispatchReport {
        let subscribers = match self.store.get_all_subscribers().await {
            Ok(subs) => subs,
            Err(e) => {
                log::warn!("Cannot load subscribers for event {}: {}", event.id, e);
                return DispatchReport::default();
            }
        };

        let matched: Vec<Subscriber> = subscribers
            .into_iter()
            .filter(|s| s.accepts(&event.url))
            .collect();
        let mut report = DispatchReport {
            matched: matched.len(),
            ..DispatchReport::default()
        };
        if matched.is_empty() {
            return report;
        }

        log::debug!(
            "Dispatching event {} for {} to {} subscribers",
            event.id,
            event.url,
            matched.len()
        );

        let mut deliveries = stream::iter(matched)
            .map(|subscriber| self.settle(subscriber, event))
            .buffer_unordered(self.max_concurrent);

        while let Some((delivered, state)) = deliveries.next().await {
            if delivered {
                report.delivered += 1;
            } else {
                report.failed += 1;
            }
            if matches!(state, CircuitBreakerResult::Tripped { .. }) {
                report.disabled += 1;
            }
        }

        report
    }

    /// Deliver to one subscriber, then update and persist its breaker state.
    ///
    /// Runs entirely inside the subscriber's own future so a slow store write
    /// never holds up the other deliveries.
    async fn settle(
        &self,
        mut subscriber: Subscriber,
        event: &ChangeEvent,
    ) -> (bool, CircuitBreakerResult) {
        let (delivered, state) = match self.deliver_one(&subscriber, event).await {
            Ok(()) => (true, self.breaker.record_success(&mut subscriber)),
            Err(e) => {
                log::warn!(
                    "Webhook delivery to {} failed: {}",
                    subscriber.callback_url,
                    e
                );
                (false, self.breaker.record_failure(&mut subscriber))
            }
        };
        if state.needs_persist() {
            if let Err(e) = self.store.put_subscriber(&subscriber).await {
                log::warn!("Cannot persist subscriber {}: {}", subscriber.id, e);
            }
        }
        (delivered, state)
    }

    async fn deliver_one(&self, subscriber: &Subscriber, event: &ChangeEvent) -> Result<()> {
        let url = subscriber.callback_url.as_str();
        match tokio::time::timeout(self.timeout, self.transport.deliver(url, event)).await {
            Ok(result) => result,
            Err(_) => Err(AppError::delivery(
                url,
                format!("timed out after {:?}", self.timeout),
            )),
        }
    }
}
