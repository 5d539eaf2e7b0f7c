//! Webhook subscriber data structure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered webhook endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subscriber {
    pub id: Uuid,

    /// URL the event body is POSTed to
    pub callback_url: String,

    /// Only events whose URL starts with this prefix are delivered
    #[serde(default)]
    pub url_prefix_filter: Option<String>,

    pub created_at: DateTime<Utc>,

    /// Consecutive delivery failures
    #[serde(default)]
    pub failure_count: u32,

    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl Subscriber {
    /// Create an active subscriber with no failures.
    pub fn new(callback_url: impl Into<String>, url_prefix_filter: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            callback_url: callback_url.into(),
            url_prefix_filter,
            created_at: Utc::now(),
            failure_count: 0,
            is_active: true,
        }
    }

    /// Whether an event for `url` should be delivered to this subscriber.
    pub fn accepts(&self, url: &str) -> bool {
        self.is_active
            && self
                .url_prefix_filter
                .as_deref()
                .is_none_or(|prefix| url.starts_with(prefix))
    }
}

fn default_active() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_without_filter() {
        let sub = Subscriber::new("https://hook.test", None);
        assert!(sub.accepts("https://anything.example/x"));
    }

    #[test]
    fn test_accepts_with_prefix() {
        let sub = Subscriber::new("https://hook.test", Some("https://news.example/".into()));
        assert!(sub.accepts("https://news.example/a"));
        assert!(!sub.accepts("https://blog.example/a"));
    }

    #[test]
    fn test_inactive_accepts_nothing() {
        let mut sub = Subscriber::new("https://hook.test", None);
        sub.is_active = false;
        assert!(!sub.accepts("https://news.example/a"));
    }
}
