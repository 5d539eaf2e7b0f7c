//! Content fingerprinting.
//!
//! Only the title and main text define a page's content. Everything else
//! (fetch time, summary, topics) is left out so a re-fetch of the same
//! page always hashes the same.

use sha2::{Digest, Sha256};

use crate::models::Article;

/// Unit separator between fields. Not expected in titles or body text.
const SEPARATOR: char = '\u{1F}';

/// Hex-encoded SHA-256 over `title + U+001F + main_text`.
pub fn fingerprint(article: &Article) -> String {
    fingerprint_parts(article.title(), &article.main_text())
}

pub fn fingerprint_parts(title: &str, main_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    let mut sep = [0u8; 4];
    hasher.update(SEPARATOR.encode_utf8(&mut sep).as_bytes());
    hasher.update(main_text.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArticleRecord, GeneralPageRecord};
    use chrono::{Duration, Utc};

    fn article(title: &str, body: &str) -> ArticleRecord {
        ArticleRecord {
            url: "https://example.com/post".into(),
            title: title.into(),
            subtitle: None,
            authors: vec![],
            published_date: None,
            modified_date: None,
            main_text: body.into(),
            summary: None,
            entities: Default::default(),
            canonical_url: None,
            topics: vec![],
            word_count: 2,
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_deterministic() {
        let a = Article::Article(article("Title", "Body"));
        assert_eq!(fingerprint(&a), fingerprint(&a));
        assert_eq!(fingerprint(&a).len(), 64);
    }

    #[test]
    fn test_ignores_non_content_fields() {
        let base = article("Title", "Body");
        let mut later = base.clone();
        later.fetched_at = base.fetched_at + Duration::seconds(90);
        later.summary = Some("summary".into());
        later.topics = vec!["news".into()];

        assert_eq!(
            fingerprint(&Article::Article(base)),
            fingerprint(&Article::Article(later))
        );
    }

    #[test]
    fn test_differs_on_title_or_text() {
        let base = fingerprint(&Article::Article(article("Title", "Body")));
        assert_ne!(base, fingerprint(&Article::Article(article("Title 2", "Body"))));
        assert_ne!(base, fingerprint(&Article::Article(article("Title", "Body 2"))));
    }

    #[test]
    fn test_separator_prevents_shifting() {
        assert_ne!(fingerprint_parts("ab", "c"), fingerprint_parts("a", "bc"));
    }

    #[test]
    fn test_general_page_uses_description_and_headlines() {
        let page = |headlines: Vec<&str>| {
            Article::GeneralPage(GeneralPageRecord {
                url: "https://example.com".into(),
                title: "Home".into(),
                description: Some("Welcome".into()),
                headlines: headlines.into_iter().map(String::from).collect(),
                links: vec![],
                topics: vec![],
                word_count: 0,
                fetched_at: Utc::now(),
            })
        };

        assert_eq!(
            fingerprint(&page(vec!["News"])),
            fingerprint_parts("Home", "Welcome\nNews")
        );
        assert_ne!(fingerprint(&page(vec!["News"])), fingerprint(&page(vec!["Other"])));
    }
}
