//! Fallback-aware fetcher.
//!
//! One call to [`AggregationFetcher::fetch`] walks this state machine:
//!
//! ```text
//! CacheCheck ──hit──────────────────────────────────────────────▶ Done (cache)
//!     │ miss
//!     ▼
//! PrimaryFetch ──error──▶ StaticFallback ──(optional Enrich)──▶ Done (fallback)
//!     │ ok
//!     ▼
//! Enrich ──▶ CacheWrite ──────────────────────────────────────▶ Done (live)
//! ```
//!
//! `fetch` is total: every path ends in a list. Enrichment isolates items from
//! each other; an item whose summary fails carries a sentinel and the batch
//! carries on, and that includes an item whose enrichment panics. Fallback
//! data is never written to the cache.
//!
//! Items are enriched through a bounded pool of `enrichment.concurrency`
//! in-flight summaries. Output order always matches listing order.

use super::BatchCache;
use crate::api::Summarizer;
use crate::config::{CacheConfig, ContentPolicy, EnrichmentConfig};
use crate::error::PipelineError;
use crate::extract::strip_truncation_marker;
use crate::models::{ContentItem, EnrichedItem, Origin, Summary};
use crate::sources::{FallbackRecord, ListingSource, PageSource, StaticDataset};
use futures::FutureExt;
use futures::stream::{self, StreamExt};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

/// A finished batch and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub items: Vec<EnrichedItem>,
    pub origin: Origin,
}

pub struct AggregationFetcher<L, P, S> {
    cache: Arc<BatchCache>,
    cache_key: String,
    listing: L,
    pages: P,
    summarizer: S,
    fallback: StaticDataset,
    settings: EnrichmentConfig,
}

impl<L, P, S> AggregationFetcher<L, P, S>
where
    L: ListingSource,
    P: PageSource,
    S: Summarizer,
{
    pub fn new(
        cache: Arc<BatchCache>,
        cache_config: &CacheConfig,
        listing: L,
        pages: P,
        summarizer: S,
        fallback: StaticDataset,
        settings: EnrichmentConfig,
    ) -> Self {
        Self {
            cache,
            cache_key: cache_config.key.clone(),
            listing,
            pages,
            summarizer,
            fallback,
            settings,
        }
    }

    pub fn cache(&self) -> &Arc<BatchCache> {
        &self.cache
    }

    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    #[cfg(test)]
    pub(crate) fn listing(&self) -> &L {
        &self.listing
    }

    /// The fresh cached batch, if there is one.
    pub fn cached(&self) -> Option<Vec<EnrichedItem>> {
        self.cache.get(&self.cache_key)
    }

    /// Run one aggregation request to completion.
    #[instrument(level = "info", skip_all, fields(cache_key = %self.cache_key))]
    pub async fn fetch(&self) -> FetchOutcome {
        let t0 = Instant::now();

        if let Some(items) = self.cached() {
            info!(count = items.len(), "Serving batch from cache");
            return FetchOutcome {
                items,
                origin: Origin::Cache,
            };
        }

        let outcome = match self.listing.fetch_listing().await {
            Ok(raw) => {
                let items = self.enrich_batch(raw).await;
                self.cache.set(&self.cache_key, items.clone(), self.cache.default_ttl());
                FetchOutcome {
                    items,
                    origin: Origin::Live,
                }
            }
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "Primary listing failed; switching to static fallback");
                self.static_fallback().await
            }
        };

        info!(
            origin = %outcome.origin,
            count = outcome.items.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Aggregation finished"
        );
        outcome
    }

    async fn static_fallback(&self) -> FetchOutcome {
        let records = self.fallback.load();
        let items = if self.settings.enrich_fallback {
            self.enrich_batch(records.into_iter().map(|r| r.item).collect())
                .await
        } else {
            records.into_iter().map(prewritten).collect()
        };
        FetchOutcome {
            items,
            origin: Origin::Fallback,
        }
    }

    /// Attach a summary to every item, preserving order and count.
    #[instrument(level = "info", skip_all, fields(total = items.len()))]
    pub async fn enrich_batch(&self, items: Vec<ContentItem>) -> Vec<EnrichedItem> {
        let total = items.len();
        let concurrency = self.settings.concurrency.max(1);

        let enriched: Vec<EnrichedItem> = stream::iter(items.into_iter().enumerate())
            .map(|(index, item)| async move {
                let summary = match AssertUnwindSafe(self.enrich_one(index, &item)).catch_unwind().await {
                    Ok(summary) => summary,
                    Err(_) => {
                        error!(index, url = %item.url, "Enrichment panicked; using sentinel");
                        Summary::Unavailable
                    }
                };
                EnrichedItem::new(item, summary)
            })
            .buffered(concurrency)
            .collect()
            .await;

        let degraded = enriched.iter().filter(|e| e.summary.is_degraded()).count();
        info!(total, degraded, concurrency, "Enriched batch");
        enriched
    }

    async fn enrich_one(&self, index: usize, item: &ContentItem) -> Summary {
        let text = self.summarizable_text(item).await;
        let text = text.trim();
        let chars = text.chars().count();
        let min = self.settings.min_content_chars;
        if chars < min {
            let e = PipelineError::ContentInsufficient { chars, min };
            debug!(index, url = %item.url, error = %e, "Not summarizing");
            return Summary::InsufficientContent;
        }

        let limit = Duration::from_secs(self.settings.item_timeout_secs);
        match timeout(limit, self.summarizer.summarize(text)).await {
            Ok(Ok(summary)) => {
                debug!(index, url = %item.url, source = ?item.source_name(), "Summarized item");
                Summary::Generated(summary)
            }
            Ok(Err(e)) => {
                warn!(index, url = %item.url, error = %e, kind = e.kind(), "Summarization failed; using sentinel");
                Summary::Unavailable
            }
            Err(_) => {
                warn!(index, url = %item.url, ?limit, "Summarization timed out; using sentinel");
                Summary::Unavailable
            }
        }
    }

    /// Pick the text to summarize according to the configured content policy.
    async fn summarizable_text(&self, item: &ContentItem) -> String {
        if self.settings.content_policy == ContentPolicy::RemotePage && item.has_fetchable_url() {
            match self.pages.fetch_page_text(&item.url).await {
                Ok(text) if text.chars().count() >= self.settings.min_content_chars => return text,
                Ok(text) => {
                    debug!(url = %item.url, chars = text.chars().count(), "Page text too short; using listing fields")
                }
                Err(e) => debug!(url = %item.url, error = %e, "Page fetch failed; using listing fields"),
            }
        }
        listing_text(item).to_string()
    }
}

/// First non-blank of `content`, `description`, `title`.
fn listing_text(item: &ContentItem) -> &str {
    item.content
        .as_deref()
        .map(strip_truncation_marker)
        .into_iter()
        .chain(item.description.as_deref())
        .chain(std::iter::once(item.title.as_str()))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or("")
}

fn prewritten(record: FallbackRecord) -> EnrichedItem {
    let summary = record
        .summary
        .filter(|s| !s.trim().is_empty())
        .map(Summary::from)
        .unwrap_or(Summary::Unavailable);
    EnrichedItem::new(record.item, summary)
}
