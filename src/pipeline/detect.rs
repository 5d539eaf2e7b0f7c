//! Change detection between a stored source and a freshly fetched page.
//!
//! Classifies the fetch against the source's stored fingerprint and
//! produces the updated source plus, on a real change, the event to record.

use crate::models::{Article, ChangeEvent, MonitoredSource};
use crate::pipeline::fingerprint::fingerprint;

/// Outcome of comparing a fetch against a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// The source had no stored fingerprint yet
    FirstCheck { new_hash: String },
    /// Same fingerprint as last time
    Unchanged { hash: String },
    /// Fingerprint differs from the stored one
    Changed { old_hash: String, new_hash: String },
}

impl Detection {
    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed { .. })
    }

    /// Fingerprint of the new content.
    pub fn new_hash(&self) -> &str {
        match self {
            Self::FirstCheck { new_hash } | Self::Changed { new_hash, .. } => new_hash,
            Self::Unchanged { hash } => hash,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::FirstCheck { .. } => "first check",
            Self::Unchanged { .. } => "unchanged",
            Self::Changed { .. } => "changed",
        }
    }
}

/// Result of applying a detection to a source.
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub detection: Detection,
    /// Source with checked-at and hash advanced
    pub source: MonitoredSource,
    /// Present only for [`Detection::Changed`]
    pub event: Option<ChangeEvent>,
}

/// Stateless fingerprint comparator.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDetector;

impl ChangeDetector {
    pub fn new() -> Self {
        Self
    }

    /// Compare `article` against the hash stored on `source`.
    pub fn classify(&self, source: &MonitoredSource, article: &Article) -> Detection {
        let new_hash = fingerprint(article);
        match source.last_content_hash.as_deref() {
            None => Detection::FirstCheck { new_hash },
            Some(old) if old == new_hash => Detection::Unchanged { hash: new_hash },
            Some(old) => Detection::Changed {
                old_hash: old.to_string(),
                new_hash,
            },
        }
    }

    /// Classify and build the updated source and any change event.
    ///
    /// Checked-at becomes the article's fetch time; it never moves backwards.
    pub fn apply(&self, source: &MonitoredSource, article: &Article) -> DetectionResult {
        let detection = self.classify(source, article);
        let detected_at = article.fetched_at();

        let mut updated = source.clone();
        updated.last_checked_at = Some(match source.last_checked_at {
            Some(prev) if prev > detected_at => prev,
            _ => detected_at,
        });
        updated.last_content_hash = Some(detection.new_hash().to_string());

        let event = match &detection {
            Detection::Changed { old_hash, new_hash } => Some(ChangeEvent::content_updated(
                article.url(),
                Some(source.id),
                detected_at,
                Some(old_hash.clone()),
                new_hash.clone(),
            )),
            _ => None,
        };

        DetectionResult {
            detection,
            source: updated,
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CONTENT_UPDATED, DEFAULT_SOURCE_KIND, GeneralPageRecord};
    use chrono::{Duration, TimeZone, Utc};

    fn page(title: &str, at: chrono::DateTime<Utc>) -> Article {
        Article::GeneralPage(GeneralPageRecord {
            url: "https://example.com".into(),
            title: title.into(),
            description: None,
            headlines: vec![],
            links: vec![],
            topics: vec![],
            word_count: 1,
            fetched_at: at,
        })
    }

    #[test]
    fn test_first_check_emits_nothing() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let source = MonitoredSource::new("https://example.com", DEFAULT_SOURCE_KIND);
        let article = page("Home", now);

        let result = ChangeDetector::new().apply(&source, &article);
        assert!(matches!(result.detection, Detection::FirstCheck { .. }));
        assert!(result.event.is_none());
        assert_eq!(result.source.last_content_hash, Some(fingerprint(&article)));
        assert_eq!(result.source.last_checked_at, Some(now));
    }

    #[test]
    fn test_unchanged_advances_checked_at() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let article = page("Home", now);
        let mut source = MonitoredSource::new("https://example.com", DEFAULT_SOURCE_KIND);
        source.last_content_hash = Some(fingerprint(&article));
        source.last_checked_at = Some(now - Duration::minutes(10));

        let result = ChangeDetector::new().apply(&source, &article);
        assert!(matches!(result.detection, Detection::Unchanged { .. }));
        assert!(result.event.is_none());
        assert_eq!(result.source.last_checked_at, Some(now));
    }

    #[test]
    fn test_changed_builds_event() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let mut source = MonitoredSource::new("https://example.com", DEFAULT_SOURCE_KIND);
        source.last_content_hash = Some("h1".into());

        let article = page("Home v2", now);
        let result = ChangeDetector::new().apply(&source, &article);
        let event = result.event.unwrap();

        assert!(result.detection.is_changed());
        assert_eq!(event.old_hash.as_deref(), Some("h1"));
        assert_eq!(event.new_hash, fingerprint(&article));
        assert_eq!(event.detected_at, now);
        assert_eq!(event.source_id, Some(source.id));
        assert_eq!(event.change_type, CONTENT_UPDATED);
        assert_eq!(result.source.last_content_hash, Some(event.new_hash));
    }

    #[test]
    fn test_checked_at_is_monotonic() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let mut source = MonitoredSource::new("https://example.com", DEFAULT_SOURCE_KIND);
        source.last_checked_at = Some(now + Duration::seconds(5));

        let result = ChangeDetector::new().apply(&source, &page("Home", now));
        assert_eq!(result.source.last_checked_at, source.last_checked_at);
    }
}
