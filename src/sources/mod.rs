//! Content sources feeding the aggregation pipeline.
//!
//! | Source | Module | Transport | Used for |
//! |--------|--------|-----------|----------|
//! | NewsAPI top headlines | [`newsapi`] | HTTP GET | primary listing |
//! | Static dataset | [`fallback`] | local file | fallback listing |
//! | Article pages | [`page`] | HTTP GET | full text for the `remote_page` policy |
//!
//! The pipeline only depends on the [`ListingSource`] and [`PageSource`]
//! traits, so tests can substitute in-memory implementations.

pub mod fallback;
pub mod newsapi;
pub mod page;

use crate::error::Result;
use crate::models::ContentItem;

/// A remote source returning one bounded batch of headlines.
pub trait ListingSource {
    /// Fetch the current batch.
    ///
    /// # Errors
    ///
    /// Any transport failure, non-success status, undecodable payload or
    /// missing credential. The caller treats every error the same way: it
    /// moves on to the fallback dataset.
    async fn fetch_listing(&self) -> Result<Vec<ContentItem>>;
}

/// Fetches an article page and returns its extracted plain text.
pub trait PageSource {
    async fn fetch_page_text(&self, url: &str) -> Result<String>;
}

pub use fallback::{FallbackRecord, StaticDataset};
pub use newsapi::NewsApiSource;
pub use page::PageFetcher;
