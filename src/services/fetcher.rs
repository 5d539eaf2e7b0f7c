// src/services/fetcher.rs

//! HTTP content pipeline: fetch, clean, extract.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::{AppError, Result};
use crate::models::{Article, FetcherConfig};
use crate::services::{Cleaner, ContentPipeline, Extractor};
use crate::utils::http::{create_async_client, fetch_page_async};

/// Owned HTTP client with an explicit lifecycle.
///
/// The client is built on first use and dropped by [`ClientHandle::release`].
/// Once released, the handle never builds another client.
pub struct ClientHandle {
    config: FetcherConfig,
    client: RwLock<Option<reqwest::Client>>,
    released: AtomicBool,
}

impl ClientHandle {
    pub fn new(config: FetcherConfig) -> Self {
        Self {
            config,
            client: RwLock::new(None),
            released: AtomicBool::new(false),
        }
    }

    /// Return the client, building it on the first call.
    pub async fn acquire(&self) -> Result<reqwest::Client> {
        if self.is_released() {
            return Err(AppError::fetch("-", "HTTP client already released"));
        }
        if let Some(client) = self.client.read().await.as_ref() {
            return Ok(client.clone());
        }

        let mut slot = self.client.write().await;
        // Re-check under the write lock; a concurrent caller may have built it.
        if self.is_released() {
            return Err(AppError::fetch("-", "HTTP client already released"));
        }
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }
        log::debug!("Building HTTP client (timeout {}s)", self.config.timeout_secs);
        let client = create_async_client(&self.config)?;
        *slot = Some(client.clone());
        Ok(client)
    }

    /// Drop the client. Returns false if it was already released.
    pub async fn release(&self) -> bool {
        if self.released.swap(true, Ordering::SeqCst) {
            log::warn!("HTTP client release requested twice, ignoring");
            return false;
        }
        let had_client = self.client.write().await.take().is_some();
        log::info!("HTTP client released (was built: {})", had_client);
        true
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub async fn is_acquired(&self) -> bool {
        self.client.read().await.is_some()
    }
}

/// [`ContentPipeline`] over plain HTTP.
pub struct HttpPipeline {
    handle: ClientHandle,
    cleaner: Cleaner,
    extractor: Extractor,
}

impl HttpPipeline {
    pub fn new(config: &FetcherConfig) -> Self {
        Self {
            handle: ClientHandle::new(config.clone()),
            cleaner: Cleaner::new(),
            extractor: Extractor::new(config.article_min_words),
        }
    }

    pub fn handle(&self) -> &ClientHandle {
        &self.handle
    }
}

#[async_trait]
impl ContentPipeline for HttpPipeline {
    async fn fetch(&self, url: &str) -> Result<Article> {
        let client = self
            .handle
            .acquire()
            .await
            .map_err(|e| AppError::fetch(url, e))?;
        let html = fetch_page_async(&client, url).await?;
        let fetched_at = Utc::now();

        let markdown = self.cleaner.clean(&html);
        self.extractor
            .extract(&markdown, &html, url, fetched_at)
            .map_err(|e| match e {
                e @ AppError::Processing { .. } => e,
                other => AppError::processing(url, other),
            })
    }

    async fn shutdown(&self) {
        self.handle.release().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn pipeline() -> HttpPipeline {
        HttpPipeline::new(&FetcherConfig {
            timeout_secs: 5,
            ..FetcherConfig::default()
        })
    }

    #[tokio::test]
    async fn test_fetch_general_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/home"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<html><head><title>Home</title></head><body><h1>Latest</h1><p>Short.</p></body></html>",
            ))
            .mount(&server)
            .await;

        let pipeline = pipeline();
        let url = format!("{}/home", server.uri());
        let article = pipeline.fetch(&url).await.unwrap();

        assert_eq!(article.type_tag(), "general_page");
        assert_eq!(article.title(), "Home");
        assert_eq!(article.url(), url);
        assert!(pipeline.handle().is_acquired().await);
    }

    #[tokio::test]
    async fn test_error_status_is_fetch_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = pipeline().fetch(&server.uri()).await.unwrap_err();
        assert!(matches!(err, AppError::Status { status: 503, .. }));
        assert_eq!(err.kind(), ErrorKind::FetchFailure);
    }

    #[tokio::test]
    async fn test_unreachable_is_fetch_failure() {
        // Port 9 (discard) is not expected to accept HTTP.
        let err = pipeline().fetch("http://127.0.0.1:9/").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FetchFailure);
    }

    #[tokio::test]
    async fn test_client_lifecycle() {
        let pipeline = pipeline();
        assert!(!pipeline.handle().is_acquired().await);

        pipeline.handle().acquire().await.unwrap();
        assert!(pipeline.handle().is_acquired().await);

        assert!(pipeline.handle().release().await);
        assert!(!pipeline.handle().release().await);
        assert!(!pipeline.handle().is_acquired().await);

        let err = pipeline.fetch("https://example.com").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FetchFailure);
    }
}
