//! Data models for sitemap entries, documents and the sitemap index.
//!
//! This module defines the core data structures used throughout the crate:
//! - [`SitemapEntry`]: One `<url>` with its optional tags
//! - [`UrlTags`]: Caller-supplied optional tags for `add_url`
//! - [`NewsTags`] / [`NewsPublication`]: Google News metadata
//! - [`SitemapDocument`]: A bounded page of entries that becomes one file
//! - [`SitemapIndex`]: The list of generated files, built after the last flush
//! - [`GeneratedFile`]: A document kept in memory instead of written to disk

use crate::errors::{Result, SitemapError};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Google's published per-file URL limit.
pub const MAX_ENTRIES_PER_FILE: usize = 50_000;

/// Priority a crawler assumes when `<priority>` is absent.
pub const DEFAULT_PRIORITY: f32 = 0.5;

/// Which urlset shape a run produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SitemapKind {
    /// Plain `<urlset>` of `<url><loc>` entries.
    #[default]
    Standard,
    /// `<urlset>` with the Google News namespace and a `<news:news>` block per entry.
    News,
}

/// How often a page is expected to change.
///
/// Accepted on input for compatibility with existing URL lists; it is never
/// serialized because crawlers ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeFrequency {
    Always,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Never,
}

impl FromStr for ChangeFrequency {
    type Err = SitemapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            "never" => Ok(Self::Never),
            other => Err(SitemapError::InvalidEntry(format!(
                "invalid changefreq value: {other}"
            ))),
        }
    }
}

impl fmt::Display for ChangeFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Always => "always",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Never => "never",
        };
        f.write_str(s)
    }
}

/// The publication a news sitemap speaks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsPublication {
    /// Publication name exactly as it appears on the site (e.g. "The Example Times").
    pub name: String,
    /// ISO 639 language code (e.g. "en").
    pub language: String,
}

/// Per-article Google News metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsTags {
    pub publication: NewsPublication,
    /// W3C date or datetime the article was published.
    pub publication_date: String,
    pub title: String,
}

/// Optional tags passed alongside a location to `add_url`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UrlTags {
    /// W3C date (`YYYY-MM-DD`) or full datetime.
    pub lastmod: Option<String>,
    pub changefreq: Option<ChangeFrequency>,
    /// Relative priority in `[0.0, 1.0]`.
    pub priority: Option<f32>,
    /// Required for every entry of a news sitemap.
    pub news: Option<NewsTags>,
}

impl UrlTags {
    pub fn with_lastmod(mut self, lastmod: impl Into<String>) -> Self {
        self.lastmod = Some(lastmod.into());
        self
    }

    pub fn with_changefreq(mut self, changefreq: ChangeFrequency) -> Self {
        self.changefreq = Some(changefreq);
        self
    }

    pub fn with_priority(mut self, priority: f32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_news(mut self, news: NewsTags) -> Self {
        self.news = Some(news);
        self
    }
}

/// One `<url>` in a sitemap document.
///
/// `location` holds the final, unescaped URL text; escaping happens when the
/// document is serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitemapEntry {
    pub location: String,
    pub last_modified: Option<String>,
    pub change_frequency: Option<ChangeFrequency>,
    pub priority: Option<f32>,
    pub news: Option<NewsTags>,
}

impl SitemapEntry {
    /// Build an entry from a resolved location and caller tags, validating the tags.
    ///
    /// # Errors
    ///
    /// Returns [`SitemapError::InvalidEntry`] if:
    /// - `location` is empty
    /// - `priority` is outside `[0.0, 1.0]`
    /// - `lastmod` or the news `publication_date` is not a W3C date/datetime
    /// - any news field is blank
    pub fn new(location: String, tags: UrlTags) -> Result<Self> {
        if location.trim().is_empty() {
            return Err(SitemapError::InvalidEntry("location cannot be empty".into()));
        }
        if let Some(priority) = tags.priority {
            if !(0.0..=1.0).contains(&priority) {
                return Err(SitemapError::InvalidEntry(format!(
                    "priority {priority} is outside 0.0..=1.0"
                )));
            }
        }
        if let Some(lastmod) = &tags.lastmod {
            validate_w3c_date("lastmod", lastmod)?;
        }
        if let Some(news) = &tags.news {
            validate_news(news)?;
        }

        Ok(Self {
            location,
            last_modified: tags.lastmod,
            change_frequency: tags.changefreq,
            priority: tags.priority,
            news: tags.news,
        })
    }
}

fn validate_news(news: &NewsTags) -> Result<()> {
    for (field, value) in [
        ("news name", &news.publication.name),
        ("news language", &news.publication.language),
        ("news title", &news.title),
        ("news publication_date", &news.publication_date),
    ] {
        if value.trim().is_empty() {
            return Err(SitemapError::InvalidEntry(format!("{field} cannot be empty")));
        }
    }
    validate_w3c_date("publication_date", &news.publication_date)
}

/// Accept `YYYY-MM-DD` or an RFC 3339 datetime.
fn validate_w3c_date(field: &str, value: &str) -> Result<()> {
    let value = value.trim();
    if NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
        || DateTime::parse_from_rfc3339(value).is_ok()
    {
        Ok(())
    } else {
        Err(SitemapError::InvalidEntry(format!(
            "{field} `{value}` is not a W3C date or datetime"
        )))
    }
}

/// A page of entries that will become one `{prefix}{N}.xml[.gz]` file.
///
/// Once [`seal`](Self::seal) is called, or the document reaches its capacity,
/// no further entries are accepted.
#[derive(Debug, Clone)]
pub struct SitemapDocument {
    kind: SitemapKind,
    capacity: usize,
    entries: Vec<SitemapEntry>,
    sealed: bool,
}

impl SitemapDocument {
    pub fn new(kind: SitemapKind, capacity: usize) -> Self {
        Self {
            kind,
            capacity,
            entries: Vec::new(),
            sealed: false,
        }
    }

    pub fn kind(&self) -> SitemapKind {
        self.kind
    }

    pub fn entries(&self) -> &[SitemapEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Append an entry. Returns the entry back if the document is sealed or full.
    pub fn push(&mut self, entry: SitemapEntry) -> std::result::Result<(), SitemapEntry> {
        if self.sealed || self.is_full() {
            return Err(entry);
        }
        self.entries.push(entry);
        Ok(())
    }
}

/// One `<sitemap>` row of the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub location: String,
    pub last_modified: String,
}

/// The table of contents listing every generated sitemap file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SitemapIndex {
    pub entries: Vec<IndexEntry>,
}

impl SitemapIndex {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A document produced in memory mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub filename: String,
    pub contents: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn news() -> NewsTags {
        NewsTags {
            publication: NewsPublication {
                name: "The Example Times".into(),
                language: "en".into(),
            },
            publication_date: "2024-04-01".into(),
            title: "Sample Article Title".into(),
        }
    }

    #[test]
    fn test_changefreq_parse_and_display() {
        assert_eq!("weekly".parse::<ChangeFrequency>().unwrap(), ChangeFrequency::Weekly);
        assert_eq!(" Daily ".parse::<ChangeFrequency>().unwrap(), ChangeFrequency::Daily);
        assert_eq!(ChangeFrequency::Never.to_string(), "never");
        assert!("fortnightly".parse::<ChangeFrequency>().is_err());
    }

    #[test]
    fn test_entry_rejects_empty_location() {
        let err = SitemapEntry::new("  ".into(), UrlTags::default()).unwrap_err();
        assert!(matches!(err, SitemapError::InvalidEntry(_)));
    }

    #[test]
    fn test_entry_rejects_out_of_range_priority() {
        let tags = UrlTags::default().with_priority(1.5);
        assert!(SitemapEntry::new("/a/".into(), tags).is_err());
        let tags = UrlTags::default().with_priority(-0.1);
        assert!(SitemapEntry::new("/a/".into(), tags).is_err());
    }

    #[test]
    fn test_entry_accepts_w3c_dates() {
        let tags = UrlTags::default().with_lastmod("2024-04-19");
        assert!(SitemapEntry::new("/a/".into(), tags).is_ok());
        let tags = UrlTags::default().with_lastmod("2024-04-19T10:30:00+00:00");
        assert!(SitemapEntry::new("/a/".into(), tags).is_ok());
        let tags = UrlTags::default().with_lastmod("19/04/2024");
        assert!(SitemapEntry::new("/a/".into(), tags).is_err());
    }

    #[test]
    fn test_entry_validates_news_fields() {
        assert!(SitemapEntry::new("/a/".into(), UrlTags::default().with_news(news())).is_ok());

        let mut blank_title = news();
        blank_title.title = String::new();
        assert!(SitemapEntry::new("/a/".into(), UrlTags::default().with_news(blank_title)).is_err());
    }

    #[test]
    fn test_document_seals_at_capacity() {
        let mut doc = SitemapDocument::new(SitemapKind::Standard, 2);
        let entry = |loc: &str| SitemapEntry::new(loc.into(), UrlTags::default()).unwrap();

        assert!(doc.push(entry("/1")).is_ok());
        assert!(doc.push(entry("/2")).is_ok());
        assert!(doc.is_full());
        assert!(doc.push(entry("/3")).is_err());
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn test_sealed_document_rejects_entries() {
        let mut doc = SitemapDocument::new(SitemapKind::Standard, 10);
        doc.seal();
        let entry = SitemapEntry::new("/a/".into(), UrlTags::default()).unwrap();
        assert!(doc.push(entry).is_err());
        assert!(doc.is_empty());
    }

    #[test]
    fn test_sitemap_kind_deserializes_lowercase() {
        let kind: SitemapKind = serde_json::from_str("\"news\"").unwrap();
        assert_eq!(kind, SitemapKind::News);
    }
}
