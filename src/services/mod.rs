//! Service layer: content fetching and webhook delivery.
//!
//! - Content pipeline (`HttpPipeline`): fetch, clean and extract a page
//! - HTML cleaning (`Cleaner`) and metadata extraction (`Extractor`)
//! - Webhook fan-out (`WebhookDispatcher`)

mod cleaner;
mod extractor;
mod fetcher;
mod webhook;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Article;

pub use cleaner::Cleaner;
pub use extractor::{Extractor, count_words};
pub use fetcher::{ClientHandle, HttpPipeline};
pub use webhook::{DispatchReport, HttpTransport, WebhookDispatcher, WebhookTransport};

/// Turns a URL into an [`Article`].
///
/// Errors carry a fetch or processing kind; callers treat both as "skip
/// this page".
#[async_trait]
pub trait ContentPipeline: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Article>;

    /// Release pooled resources. Called once at shutdown.
    async fn shutdown(&self) {}
}
