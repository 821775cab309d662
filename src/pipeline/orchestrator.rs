//! Aggregation orchestrator: the one entry point the display layer calls.
//!
//! [`Aggregator::latest`] is safe to call on every render. Within the cache
//! TTL it never reaches upstream, and it never fails: if the fetcher panics,
//! the last known-good batch is served instead, or an empty list.

use super::fetcher::{AggregationFetcher, FetchOutcome};
use crate::api::Summarizer;
use crate::cache::CacheStatus;
use crate::models::{EnrichedItem, Origin};
use crate::sources::{ListingSource, PageSource};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Mutex, PoisonError};
use tracing::{error, info, instrument};

pub struct Aggregator<L, P, S> {
    fetcher: AggregationFetcher<L, P, S>,
    last_good: Mutex<Option<Vec<EnrichedItem>>>,
}

impl<L, P, S> Aggregator<L, P, S>
where
    L: ListingSource,
    P: PageSource,
    S: Summarizer,
{
    pub fn new(fetcher: AggregationFetcher<L, P, S>) -> Self {
        Self {
            fetcher,
            last_good: Mutex::new(None),
        }
    }

    /// The current batch from the best available source, and where it came from.
    ///
    /// # Returns
    ///
    /// A [`FetchOutcome`] whose `items` is the list for the display layer. This
    /// never fails; after a panic the `origin` is [`Origin::LastKnownGood`] or
    /// [`Origin::Empty`].
    #[instrument(level = "info", skip_all)]
    pub async fn latest(&self) -> FetchOutcome {
        match AssertUnwindSafe(self.fetcher.fetch()).catch_unwind().await {
            Ok(outcome) => {
                if matches!(outcome.origin, Origin::Cache | Origin::Live) {
                    *self.last_good_slot() = Some(outcome.items.clone());
                }
                outcome
            }
            Err(panic) => {
                error!(panic = %panic_message(&panic), "Aggregation panicked; serving last known-good batch");
                self.recover()
            }
        }
    }

    /// Drop the cached batch and aggregate again.
    pub async fn refresh(&self) -> FetchOutcome {
        info!(cache_key = %self.fetcher.cache_key(), "Invalidating cached batch");
        self.fetcher.cache().invalidate(self.fetcher.cache_key());
        self.latest().await
    }

    /// Drop every cached batch, in both tiers.
    pub fn clear_cache(&self) {
        info!("Clearing cache");
        self.fetcher.cache().clear();
    }

    pub fn cache_status(&self) -> CacheStatus {
        self.fetcher.cache().status(self.fetcher.cache_key())
    }

    fn recover(&self) -> FetchOutcome {
        let remembered = self.fetcher.cached().or_else(|| self.last_good_slot().clone());
        match remembered {
            Some(items) => FetchOutcome {
                items,
                origin: Origin::LastKnownGood,
            },
            None => FetchOutcome {
                items: Vec::new(),
                origin: Origin::Empty,
            },
        }
    }

    fn last_good_slot(&self) -> std::sync::MutexGuard<'_, Option<Vec<EnrichedItem>>> {
        self.last_good.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
