//! Data models for listing items and their enriched representations.
//!
//! This module defines the core data structures used throughout the application:
//! - [`ContentItem`]: a raw headline as returned by the listing source
//! - [`Summary`]: the generated summary, or one of two fixed sentinels
//! - [`EnrichedItem`]: a [`ContentItem`] paired with exactly one [`Summary`]
//! - [`Digest`]: the batch handed to the display layer, with its provenance
//!
//! Field names on the wire follow the NewsAPI article schema (camelCase), so
//! the live listing, the static fallback file and the cache all share one shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel emitted when summarization failed for an item.
pub const SUMMARY_UNAVAILABLE: &str = "Summary unavailable";

/// Sentinel emitted when an item had too little text to summarize.
pub const INSUFFICIENT_CONTENT: &str = "Insufficient content available for summarization";

/// The publisher a listing item was attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

/// A raw headline as returned by the listing source.
///
/// The `url` is the identity key of an item within one batch. Items are never
/// mutated after they are fetched; enrichment wraps them in an [`EnrichedItem`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    #[serde(default)]
    pub source: Option<SourceRef>,
    #[serde(default)]
    pub author: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub url: String,
    #[serde(default)]
    pub url_to_image: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub content: Option<String>,
}

impl ContentItem {
    /// Name of the publisher, if the listing carried one.
    pub fn source_name(&self) -> Option<&str> {
        self.source.as_ref().map(|s| s.name.as_str())
    }

    /// Whether the item's URL is something we can fetch over HTTP.
    ///
    /// Placeholder links like `#` in the fallback dataset are rejected.
    pub fn has_fetchable_url(&self) -> bool {
        url::Url::parse(&self.url)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
            .unwrap_or(false)
    }
}

/// The summary attached to an [`EnrichedItem`].
///
/// Serialized as a plain string. The two sentinels serialize to their fixed
/// text and round-trip back into their variants, so a cached batch keeps the
/// distinction between genuine summaries and degraded ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Summary {
    Generated(String),
    Unavailable,
    InsufficientContent,
}

impl Summary {
    pub fn as_str(&self) -> &str {
        match self {
            Summary::Generated(text) => text,
            Summary::Unavailable => SUMMARY_UNAVAILABLE,
            Summary::InsufficientContent => INSUFFICIENT_CONTENT,
        }
    }

    /// `true` for either sentinel.
    pub fn is_degraded(&self) -> bool {
        !matches!(self, Summary::Generated(_))
    }
}

impl From<String> for Summary {
    fn from(s: String) -> Self {
        match s.as_str() {
            SUMMARY_UNAVAILABLE => Summary::Unavailable,
            INSUFFICIENT_CONTENT => Summary::InsufficientContent,
            _ => Summary::Generated(s),
        }
    }
}

impl From<Summary> for String {
    fn from(s: Summary) -> Self {
        match s {
            Summary::Generated(text) => text,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A listing item with its summary attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedItem {
    #[serde(flatten)]
    pub item: ContentItem,
    pub summary: Summary,
}

impl EnrichedItem {
    pub fn new(item: ContentItem, summary: Summary) -> Self {
        Self { item, summary }
    }
}

/// Where a batch returned to the display layer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// A fresh entry from the tiered cache.
    Cache,
    /// Fetched from the listing source and enriched during this call.
    Live,
    /// The static fallback dataset.
    Fallback,
    /// The last batch served before the pipeline failed unexpectedly.
    LastKnownGood,
    /// Nothing was available at all.
    Empty,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Origin::Cache => "cache",
            Origin::Live => "live",
            Origin::Fallback => "fallback",
            Origin::LastKnownGood => "last_known_good",
            Origin::Empty => "empty",
        };
        f.write_str(s)
    }
}

/// One batch as written for the display layer.
///
/// Mirrors the edition layout used for JSON output: a date, an edition name
/// ("morning", "afternoon" or "evening") and the local time of generation.
#[derive(Debug, Deserialize, Serialize)]
pub struct Digest {
    pub local_date: String,
    pub time_of_day: String,
    pub local_time: String,
    pub origin: Origin,
    pub articles: Vec<EnrichedItem>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(url: &str) -> ContentItem {
        ContentItem {
            source: Some(SourceRef {
                id: None,
                name: "Example Wire".to_string(),
            }),
            author: None,
            title: "Test".to_string(),
            description: Some("Description".to_string()),
            url: url.to_string(),
            url_to_image: None,
            published_at: None,
            content: None,
        }
    }

    #[test]
    fn test_summary_sentinels_roundtrip_as_plain_strings() {
        let json = serde_json::to_string(&Summary::Unavailable).unwrap();
        assert_eq!(json, "\"Summary unavailable\"");

        let parsed: Summary =
            serde_json::from_str("\"Insufficient content available for summarization\"").unwrap();
        assert_eq!(parsed, Summary::InsufficientContent);

        let parsed: Summary = serde_json::from_str("\"- one\\n- two\\n- three\"").unwrap();
        assert_eq!(parsed, Summary::Generated("- one\n- two\n- three".to_string()));
        assert!(!parsed.is_degraded());
    }

    #[test]
    fn test_content_item_deserializes_newsapi_shape() {
        let json = r#"{
            "source": { "id": null, "name": "Reuters" },
            "author": null,
            "title": "Markets rally",
            "description": "Stocks rose.",
            "url": "https://example.com/markets",
            "urlToImage": "https://example.com/img.jpg",
            "publishedAt": "2025-05-06T14:30:00Z",
            "content": "Stocks rose on Tuesday... [+1200 chars]"
        }"#;

        let parsed: ContentItem = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.source_name(), Some("Reuters"));
        assert_eq!(parsed.url_to_image.as_deref(), Some("https://example.com/img.jpg"));
        assert!(parsed.published_at.is_some());
    }

    #[test]
    fn test_enriched_item_flattens_fields() {
        let enriched = EnrichedItem::new(item("https://example.com/a"), Summary::Unavailable);
        let value = serde_json::to_value(&enriched).unwrap();
        assert_eq!(value["url"], "https://example.com/a");
        assert_eq!(value["summary"], SUMMARY_UNAVAILABLE);

        let back: EnrichedItem = serde_json::from_value(value).unwrap();
        assert_eq!(back, enriched);
    }

    #[test]
    fn test_fetchable_url() {
        assert!(item("https://example.com/a").has_fetchable_url());
        assert!(!item("#").has_fetchable_url());
        assert!(!item("ftp://example.com/a").has_fetchable_url());
    }

    #[test]
    fn test_origin_display() {
        assert_eq!(Origin::LastKnownGood.to_string(), "last_known_good");
        assert_eq!(serde_json::to_string(&Origin::Live).unwrap(), "\"live\"");
    }
}
