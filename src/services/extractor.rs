// src/services/extractor.rs

//! Heuristic metadata extraction.
//!
//! Reads page metadata (OpenGraph, Twitter cards, standard meta tags) from
//! the raw HTML and decides between an article and a general page by the
//! word count of the cleaned Markdown.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use scraper::{Html, Selector};
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{AppError, Result};
use crate::models::{Article, ArticleRecord, Entities, GeneralPageRecord, LinkItem};
use crate::utils::{collapse_whitespace, resolve};

const UNTITLED: &str = "Untitled Page";
const MAX_HEADLINES: usize = 10;
const MAX_LINKS: usize = 20;

/// Builds an [`Article`] from a page's HTML and its cleaned Markdown.
#[derive(Debug, Clone)]
pub struct Extractor {
    article_min_words: usize,
}

impl Extractor {
    /// Pages with more than `article_min_words` words become articles.
    pub fn new(article_min_words: usize) -> Self {
        Self { article_min_words }
    }

    pub fn extract(
        &self,
        markdown: &str,
        html: &str,
        url: &str,
        fetched_at: DateTime<Utc>,
    ) -> Result<Article> {
        let document = Html::parse_document(html);

        let title = title(&document, url)?.unwrap_or_else(|| UNTITLED.to_string());
        let description = description(&document, url)?;
        let word_count = count_words(markdown);

        if word_count > self.article_min_words {
            let canonical_url = canonical_url(&document, url)?.unwrap_or_else(|| url.to_string());
            return Ok(Article::Article(ArticleRecord {
                url: url.to_string(),
                title,
                subtitle: description.clone(),
                authors: authors(&document, url)?,
                published_date: published_date(&document, url)?,
                modified_date: meta_content(&document, url, r#"meta[property="article:modified_time"]"#)?
                    .and_then(|raw| parse_date(&raw)),
                main_text: markdown.to_string(),
                summary: description,
                entities: Entities::default(),
                canonical_url: Some(canonical_url),
                topics: Vec::new(),
                word_count,
                fetched_at,
            }));
        }

        Ok(Article::GeneralPage(GeneralPageRecord {
            url: url.to_string(),
            title,
            description,
            headlines: headlines(&document, url)?,
            links: links(&document, url)?,
            topics: Vec::new(),
            word_count,
            fetched_at,
        }))
    }
}

/// Unicode-aware word count.
pub fn count_words(text: &str) -> usize {
    text.unicode_words().count()
}

fn parse_selector(url: &str, s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::processing(url, format!("bad selector {s}: {e:?}")))
}

/// Trimmed `content` of the first matching meta tag, if non-empty.
fn meta_content(document: &Html, url: &str, selector: &str) -> Result<Option<String>> {
    let sel = parse_selector(url, selector)?;
    Ok(document
        .select(&sel)
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .find(|c| !c.is_empty())
        .map(str::to_string))
}

fn first_text(document: &Html, url: &str, selector: &str) -> Result<Option<String>> {
    let sel = parse_selector(url, selector)?;
    Ok(document
        .select(&sel)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .find(|t| !t.is_empty()))
}

fn title(document: &Html, url: &str) -> Result<Option<String>> {
    for selector in [
        r#"meta[property="og:title"]"#,
        r#"meta[name="twitter:title"]"#,
    ] {
        if let Some(t) = meta_content(document, url, selector)? {
            return Ok(Some(t));
        }
    }
    if let Some(t) = first_text(document, url, "title")? {
        return Ok(Some(t));
    }
    first_text(document, url, "h1")
}

fn description(document: &Html, url: &str) -> Result<Option<String>> {
    if let Some(d) = meta_content(document, url, r#"meta[property="og:description"]"#)? {
        return Ok(Some(d));
    }
    meta_content(document, url, r#"meta[name="description"]"#)
}

/// Authors from meta tags and `rel=author` links, deduplicated in order.
fn authors(document: &Html, url: &str) -> Result<Vec<String>> {
    let meta_sel = parse_selector(url, "meta")?;
    let rel_sel = parse_selector(url, r#"a[rel~="author"]"#)?;

    let from_meta = document.select(&meta_sel).filter_map(|el| {
        let key = el.value().attr("property").or_else(|| el.value().attr("name"))?;
        let content = match key {
            "author" | "article:author" | "book:author" => el.value().attr("content")?,
            _ => return None,
        };
        Some(content.trim().to_string())
    });
    let from_links = document
        .select(&rel_sel)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()));

    let mut seen = HashSet::new();
    Ok(from_meta
        .chain(from_links)
        .filter(|a| !a.is_empty())
        .filter(|a| seen.insert(a.clone()))
        .collect())
}

fn published_date(document: &Html, url: &str) -> Result<Option<DateTime<Utc>>> {
    for selector in [
        r#"meta[property="article:published_time"]"#,
        r#"meta[name="date"]"#,
    ] {
        if let Some(raw) = meta_content(document, url, selector)? {
            return Ok(parse_date(&raw));
        }
    }
    Ok(None)
}

/// Parse RFC 3339, or a bare `YYYY-MM-DD` prefix at midnight UTC.
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw.trim()) {
        return Some(ts.with_timezone(&Utc));
    }
    let re = regex::Regex::new(r"^\s*(\d{4}-\d{2}-\d{2})").ok()?;
    let day = re.captures(raw)?.get(1)?.as_str();
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
}

fn canonical_url(document: &Html, url: &str) -> Result<Option<String>> {
    let sel = parse_selector(url, r#"link[rel="canonical"]"#)?;
    Ok(document
        .select(&sel)
        .filter_map(|el| el.value().attr("href"))
        .map(str::trim)
        .find(|h| !h.is_empty())
        .map(|h| resolve(url, h).unwrap_or_else(|| h.to_string())))
}

fn headlines(document: &Html, url: &str) -> Result<Vec<String>> {
    let sel = parse_selector(url, "h1, h2, h3")?;
    Ok(document
        .select(&sel)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .take(MAX_HEADLINES)
        .collect())
}

/// Links with visible text, deduplicated by raw `href`.
fn links(document: &Html, url: &str) -> Result<Vec<LinkItem>> {
    let sel = parse_selector(url, "a[href]")?;
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for el in document.select(&sel) {
        let Some(href) = el.value().attr("href").map(str::trim) else {
            continue;
        };
        let text = collapse_whitespace(&el.text().collect::<String>());
        if text.is_empty() || href.is_empty() || !seen.insert(href.to_string()) {
            continue;
        }
        links.push(LinkItem {
            text,
            url: Some(resolve(url, href).unwrap_or_else(|| href.to_string())),
        });
        if links.len() >= MAX_LINKS {
            break;
        }
    }
    Ok(links)
}
