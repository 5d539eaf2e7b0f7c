//! Change event data structure and its webhook payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Article;

/// Change type emitted when a fingerprint differs from the stored one.
pub const CONTENT_UPDATED: &str = "content_updated";

/// A detected content change. Append-only once stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeEvent {
    pub id: Uuid,

    /// URL of the changed page
    pub url: String,

    #[serde(default)]
    pub source_id: Option<Uuid>,

    /// Fetch time of the article that revealed the change
    pub detected_at: DateTime<Utc>,

    #[serde(default)]
    pub old_hash: Option<String>,

    pub new_hash: String,

    #[serde(default = "default_change_type")]
    pub change_type: String,

    /// Current page content, attached on the read path only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_article: Option<Article>,
}

/// Wire body sent to subscribers.
#[derive(Debug, Serialize)]
pub struct EventPayload<'a> {
    pub id: Uuid,
    pub url: &'a str,
    pub source_id: Option<Uuid>,
    pub detected_at: DateTime<Utc>,
    pub old_hash: Option<&'a str>,
    pub new_hash: &'a str,
    pub change_type: &'a str,
}

impl ChangeEvent {
    /// Create a `content_updated` event.
    pub fn content_updated(
        url: impl Into<String>,
        source_id: Option<Uuid>,
        detected_at: DateTime<Utc>,
        old_hash: Option<String>,
        new_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            source_id,
            detected_at,
            old_hash,
            new_hash: new_hash.into(),
            change_type: CONTENT_UPDATED.to_string(),
            current_article: None,
        }
    }

    /// Timeline score: seconds since epoch, fractional.
    pub fn score(&self) -> f64 {
        timestamp_score(self.detected_at)
    }

    /// Flat webhook body. Never includes `current_article`.
    pub fn payload(&self) -> EventPayload<'_> {
        EventPayload {
            id: self.id,
            url: &self.url,
            source_id: self.source_id,
            detected_at: self.detected_at,
            old_hash: self.old_hash.as_deref(),
            new_hash: &self.new_hash,
            change_type: &self.change_type,
        }
    }
}

/// Convert a timestamp into a timeline score.
pub fn timestamp_score(ts: DateTime<Utc>) -> f64 {
    ts.timestamp_micros() as f64 / 1_000_000.0
}

fn default_change_type() -> String {
    CONTENT_UPDATED.to_string()
}
