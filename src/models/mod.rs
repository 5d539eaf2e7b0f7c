// src/models/mod.rs

//! Domain models for the monitor.
//!
//! Records handed out by the store are detached copies: mutate them, then
//! write them back through the store to persist.

mod article;
mod config;
mod event;
mod source;
mod subscriber;

// Re-export all public types
pub use article::{Article, ArticleRecord, DateEntity, Entities, GeneralPageRecord, LinkItem};
pub use config::{
    BackendKind, CacheConfig, Config, FetcherConfig, LoggingConfig, MonitorConfig, StorageConfig,
    WebhookConfig,
};
pub use event::{CONTENT_UPDATED, ChangeEvent, EventPayload, timestamp_score};
pub use source::{DEFAULT_SOURCE_KIND, MonitoredSource};
pub use subscriber::Subscriber;
