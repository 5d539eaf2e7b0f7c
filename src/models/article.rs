//! Article data structures produced by the content pipeline.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A date mention found in the text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DateEntity {
    pub raw: String,
    #[serde(default)]
    pub normalized: Option<String>,
}

/// Named entities mentioned in an article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Entities {
    #[serde(default)]
    pub people: Vec<String>,
    #[serde(default)]
    pub organizations: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub dates: Vec<DateEntity>,
}

/// A long-form article page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArticleRecord {
    /// Source URL
    pub url: String,

    /// Headline
    pub title: String,

    /// Subtitle or deck
    #[serde(default)]
    pub subtitle: Option<String>,

    #[serde(default)]
    pub authors: Vec<String>,

    #[serde(default)]
    pub published_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub modified_date: Option<DateTime<Utc>>,

    /// Cleaned body in Markdown
    pub main_text: String,

    #[serde(default)]
    pub summary: Option<String>,

    #[serde(default)]
    pub entities: Entities,

    #[serde(default)]
    pub canonical_url: Option<String>,

    #[serde(default)]
    pub topics: Vec<String>,

    pub word_count: usize,

    /// When the pipeline produced this value
    pub fetched_at: DateTime<Utc>,
}

/// A link found on a general page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkItem {
    pub text: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// A navigation, landing or otherwise short page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralPageRecord {
    pub url: String,

    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Up to 10 `h1`-`h3` texts
    #[serde(default)]
    pub headlines: Vec<String>,

    /// Up to 20 deduplicated links
    #[serde(default)]
    pub links: Vec<LinkItem>,

    #[serde(default)]
    pub topics: Vec<String>,

    #[serde(default)]
    pub word_count: usize,

    pub fetched_at: DateTime<Utc>,
}

impl GeneralPageRecord {
    /// Description followed by headlines, one per line.
    pub fn main_text(&self) -> String {
        self.description
            .iter()
            .chain(self.headlines.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Structured result of processing one page.
///
/// Values are never mutated in place: each fetch produces a new one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Article {
    #[serde(rename = "article")]
    Article(ArticleRecord),
    #[serde(rename = "general_page")]
    GeneralPage(GeneralPageRecord),
}

impl Article {
    pub fn url(&self) -> &str {
        match self {
            Self::Article(a) => &a.url,
            Self::GeneralPage(p) => &p.url,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Article(a) => &a.title,
            Self::GeneralPage(p) => &p.title,
        }
    }

    /// The text that defines this page's content.
    pub fn main_text(&self) -> Cow<'_, str> {
        match self {
            Self::Article(a) => Cow::Borrowed(&a.main_text),
            Self::GeneralPage(p) => Cow::Owned(p.main_text()),
        }
    }

    pub fn word_count(&self) -> usize {
        match self {
            Self::Article(a) => a.word_count,
            Self::GeneralPage(p) => p.word_count,
        }
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        match self {
            Self::Article(a) => a.fetched_at,
            Self::GeneralPage(p) => p.fetched_at,
        }
    }

    /// Type tag as it appears in JSON.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Article(_) => "article",
            Self::GeneralPage(_) => "general_page",
        }
    }
}
