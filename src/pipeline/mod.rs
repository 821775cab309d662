//! The aggregation pipeline: cache → live listing → enrichment → fallback.
//!
//! - [`fetcher`]: the fallback-aware fetcher state machine
//! - [`orchestrator`]: the single entry point the display layer calls
//!
//! [`build_aggregator`] wires the production sources, summarizer and cache
//! together once at startup.

pub mod fetcher;
pub mod orchestrator;

pub use fetcher::{AggregationFetcher, FetchOutcome};
pub use orchestrator::Aggregator;

use crate::api::SummarizerBackend;
use crate::cache::{FileStore, TieredCache};
use crate::config::AppConfig;
use crate::error::Result;
use crate::models::EnrichedItem;
use crate::sources::{NewsApiSource, PageFetcher, StaticDataset};
use std::sync::Arc;
use tracing::info;

/// The cache type shared by every stage of the pipeline.
pub type BatchCache = TieredCache<Vec<EnrichedItem>>;

/// The production aggregator.
pub type NewsAggregator = Aggregator<NewsApiSource, PageFetcher, SummarizerBackend>;

/// Build the cache for `config`, with a durable tier when a directory is set.
pub fn build_cache(config: &AppConfig) -> Arc<BatchCache> {
    let cache = BatchCache::new(config.cache.ttl());
    let cache = match &config.cache.dir {
        Some(dir) => {
            info!(dir = %dir.display(), ttl_secs = config.cache.ttl_secs, "Cache has a durable tier");
            cache.with_durable(FileStore::new(dir))
        }
        None => {
            info!(ttl_secs = config.cache.ttl_secs, "Cache is memory-only");
            cache
        }
    };
    Arc::new(cache)
}

/// Wire the production pipeline from configuration.
///
/// # Arguments
///
/// * `config` - Fully layered configuration (file, then CLI and environment)
///
/// # Returns
///
/// A ready [`NewsAggregator`], or an error when an HTTP client cannot be
/// built. A missing OpenRouter key is not an error: mock summaries are used.
pub fn build_aggregator(config: &AppConfig) -> Result<NewsAggregator> {
    let summarizer = SummarizerBackend::from_config(&config.summarizer)?;
    info!(
        mock_summaries = summarizer.is_mock(),
        content_policy = ?config.enrichment.content_policy,
        concurrency = config.enrichment.concurrency,
        "Pipeline configured"
    );
    let fetcher = AggregationFetcher::new(
        build_cache(config),
        &config.cache,
        NewsApiSource::new(config.news.clone())?,
        PageFetcher::new(&config.page)?,
        summarizer,
        StaticDataset::new(&config.fallback.path),
        config.enrichment.clone(),
    );
    Ok(Aggregator::new(fetcher))
}


/// In-memory stand-ins for the pipeline's collaborators.
#[cfg(test)]
pub(crate) mod testing {
    use crate::api::Summarizer;
    use crate::error::{PipelineError, Result};
    use crate::models::{ContentItem, SourceRef};
    use crate::sources::{ListingSource, PageSource};
    use crate::utils::truncate_chars;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub fn item(n: usize, body: &str) -> ContentItem {
        ContentItem {
            source: Some(SourceRef {
                id: None,
                name: "Stub Wire".to_string(),
            }),
            author: None,
            title: format!("Headline {n}"),
            description: Some(body.to_string()),
            url: format!("https://news.example/{n}"),
            url_to_image: None,
            published_at: None,
            content: None,
        }
    }

    pub fn long_body(tag: &str) -> String {
        format!("{tag} This article body is comfortably longer than the minimum summarizable length.")
    }

    /// Replays queued listing responses, then fails (or panics).
    #[derive(Default)]
    pub struct StubListing {
        responses: Mutex<VecDeque<Result<Vec<ContentItem>>>>,
        panic_when_drained: bool,
        pub calls: AtomicUsize,
    }

    impl StubListing {
        pub fn with(responses: Vec<Result<Vec<ContentItem>>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                ..Self::default()
            }
        }

        pub fn panicking_after(responses: Vec<Result<Vec<ContentItem>>>) -> Self {
            Self {
                panic_when_drained: true,
                ..Self::with(responses)
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ListingSource for StubListing {
        async fn fetch_listing(&self) -> Result<Vec<ContentItem>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.responses.lock().unwrap().pop_front();
            match next {
                Some(response) => response,
                None if self.panic_when_drained => panic!("listing exploded"),
                None => Err(PipelineError::Transport {
                    target: "stub".to_string(),
                    message: "no more responses".to_string(),
                }),
            }
        }
    }

    /// Fails on content containing `FAIL`, panics on `PANIC`, else echoes a prefix.
    #[derive(Default)]
    pub struct ScriptedSummarizer {
        pub fail_all: bool,
        pub calls: AtomicUsize,
        pub seen: Mutex<Vec<String>>,
    }

    impl ScriptedSummarizer {
        pub fn failing() -> Self {
            Self {
                fail_all: true,
                ..Self::default()
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Summarizer for ScriptedSummarizer {
        async fn summarize(&self, content: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(content.to_string());
            if content.contains("PANIC") {
                panic!("summarizer exploded");
            }
            if self.fail_all || content.contains("FAIL") {
                return Err(PipelineError::Summarization("scripted failure".to_string()));
            }
            Ok(format!("- {}", truncate_chars(content, 20)))
        }
    }

    /// Serves canned page text per URL; unknown URLs fail.
    #[derive(Default)]
    pub struct StubPages {
        pub pages: HashMap<String, String>,
        pub calls: AtomicUsize,
    }

    impl PageSource for StubPages {
        async fn fetch_page_text(&self, url: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pages.get(url).cloned().ok_or_else(|| PipelineError::UpstreamStatus {
                target: url.to_string(),
                status: 404,
            })
        }
    }
}
