//! Monitored source data structure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Default type tag for new sources.
pub const DEFAULT_SOURCE_KIND: &str = "article_page";

/// A page registered for periodic re-fetching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonitoredSource {
    pub id: Uuid,

    /// Target URL
    pub url: String,

    /// Free-form type tag
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,

    /// Last refresh time. Timestamps without an offset read as `None`.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_checked_at: Option<DateTime<Utc>>,

    /// Fingerprint of the last fetched content
    #[serde(default)]
    pub last_content_hash: Option<String>,
}

impl MonitoredSource {
    /// Create a never-checked source.
    pub fn new(url: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            kind: kind.into(),
            last_checked_at: None,
            last_content_hash: None,
        }
    }

    /// Whether the source should be refreshed at `now` given `ttl`.
    pub fn is_due(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        match self.last_checked_at {
            Some(checked) => now.signed_duration_since(checked) >= ttl,
            None => true,
        }
    }
}

fn default_kind() -> String {
    DEFAULT_SOURCE_KIND.to_string()
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }))
}
