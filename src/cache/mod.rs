//! Tiered key/value cache with time-to-live expiry.
//!
//! The cache has two layers:
//!
//! - a **fast tier**: an in-process map, authoritative for the process lifetime
//! - an optional **durable tier**: any [`DurableStore`], e.g. [`FileStore`]
//!
//! Writes go to the fast tier and are mirrored to the durable tier. Mirror
//! failures are logged and swallowed. Reads check the fast tier first, then
//! the durable tier, promoting a fresh durable hit into the fast tier.
//!
//! # Expiry
//!
//! Expiry is lazy: an entry is readable iff `now < expires_at`, and the read
//! that finds an expired entry removes it from whichever tier held it. There
//! is no background sweep. Undecodable durable records are treated as misses
//! and deleted.
//!
//! # Values
//!
//! One key holds one whole value; `set` replaces it. Concurrent writers to
//! the same key are last-writer-wins.

mod store;

pub use store::{DurableStore, FileStore};

use crate::error::PipelineError;
use chrono::{DateTime, TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// A cached value and the instant it stops being readable.
///
/// This is also the durable record format: `{"value": ..., "expiresAt": <epoch ms>}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub value: T,
    #[serde(rename = "expiresAt", with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Freshness report for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStatus {
    pub cached: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub remaining: Option<Duration>,
}

impl CacheStatus {
    fn absent() -> Self {
        Self {
            cached: false,
            expires_at: None,
            remaining: None,
        }
    }
}

/// Fast in-process tier in front of an optional durable tier.
pub struct TieredCache<T> {
    fast: Mutex<HashMap<String, CacheEntry<T>>>,
    durable: Option<Box<dyn DurableStore>>,
    default_ttl: Duration,
}

impl<T> std::fmt::Debug for TieredCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("durable", &self.durable.is_some())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl<T> TieredCache<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    /// Create a memory-only cache.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            fast: Mutex::new(HashMap::new()),
            durable: None,
            default_ttl,
        }
    }

    /// Attach a durable tier.
    pub fn with_durable(mut self, store: impl DurableStore + 'static) -> Self {
        self.durable = Some(Box::new(store));
        self
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Store `value` under `key` for `ttl`.
    pub fn set(&self, key: &str, value: T, ttl: Duration) {
        self.set_at(key, value, ttl, Utc::now());
    }

    /// Fetch the value under `key` if it has not expired.
    pub fn get(&self, key: &str) -> Option<T> {
        self.get_at(key, Utc::now())
    }

    /// Report whether `key` holds a fresh entry. Expired entries are removed.
    pub fn status(&self, key: &str) -> CacheStatus {
        self.status_at(key, Utc::now())
    }

    /// Drop `key` from both tiers.
    #[instrument(level = "debug", skip(self))]
    pub fn invalidate(&self, key: &str) {
        self.fast_tier().remove(key);
        self.remove_durable(key, "invalidated");
    }

    /// Drop every entry from both tiers.
    pub fn clear(&self) {
        self.fast_tier().clear();
        if let Some(store) = &self.durable {
            if let Err(e) = store.clear() {
                warn!(error = %e, "Failed to clear durable cache tier");
            }
        }
    }

    pub(crate) fn set_at(&self, key: &str, value: T, ttl: Duration, now: DateTime<Utc>) {
        let expires_at = TimeDelta::from_std(ttl)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let entry = CacheEntry { value, expires_at };

        if let Some(store) = &self.durable {
            match serde_json::to_string(&entry) {
                Ok(record) => {
                    if let Err(e) = store.store(key, &record) {
                        warn!(key, error = %e, kind = e.kind(), "Durable cache mirror failed; fast tier still updated");
                    }
                }
                Err(e) => warn!(key, error = %e, "Could not serialize cache entry for durable tier"),
            }
        }

        self.fast_tier().insert(key.to_string(), entry);
        debug!(key, %expires_at, "Cache entry written");
    }

    pub(crate) fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<T> {
        self.lookup_at(key, now).map(|entry| entry.value)
    }

    pub(crate) fn status_at(&self, key: &str, now: DateTime<Utc>) -> CacheStatus {
        match self.lookup_at(key, now) {
            Some(entry) => CacheStatus {
                cached: true,
                expires_at: Some(entry.expires_at),
                remaining: (entry.expires_at - now).to_std().ok(),
            },
            None => CacheStatus::absent(),
        }
    }

    fn lookup_at(&self, key: &str, now: DateTime<Utc>) -> Option<CacheEntry<T>> {
        {
            let mut fast = self.fast_tier();
            if let Some(entry) = fast.get(key) {
                if entry.is_fresh_at(now) {
                    return Some(entry.clone());
                }
                fast.remove(key);
                debug!(key, "Evicted expired fast-tier entry");
            }
        }

        let store = self.durable.as_ref()?;
        let raw = match store.load(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "Durable cache read failed; treating as miss");
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry<T>>(&raw) {
            Ok(entry) if entry.is_fresh_at(now) => {
                debug!(key, "Promoted durable entry into fast tier");
                self.fast_tier().insert(key.to_string(), entry.clone());
                Some(entry)
            }
            Ok(_) => {
                self.remove_durable(key, "expired");
                None
            }
            Err(e) => {
                let err = PipelineError::CacheCorruption {
                    key: key.to_string(),
                    reason: e.to_string(),
                };
                warn!(error = %err, kind = err.kind(), "Discarding undecodable durable record");
                self.remove_durable(key, "corrupt");
                None
            }
        }
    }

    fn remove_durable(&self, key: &str, reason: &str) {
        if let Some(store) = &self.durable {
            match store.remove(key) {
                Ok(()) => debug!(key, reason, "Removed durable cache record"),
                Err(e) => warn!(key, reason, error = %e, "Failed to remove durable cache record"),
            }
        }
    }

    fn fast_tier(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<T>>> {
        self.fast.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const HOUR: Duration = Duration::from_secs(3600);

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-05-06T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_readable_until_expiry_then_gone_for_good() {
        let cache: TieredCache<Vec<String>> = TieredCache::new(HOUR);
        cache.set_at("k", vec!["a".to_string()], HOUR, t0());

        let just_before = t0() + TimeDelta::seconds(3599);
        assert_eq!(cache.get_at("k", just_before), Some(vec!["a".to_string()]));

        let at_expiry = t0() + TimeDelta::seconds(3600);
        assert_eq!(cache.get_at("k", at_expiry), None);
        // No resurrection, even when asked "in the past".
        assert_eq!(cache.get_at("k", t0()), None);
    }

    #[test]
    fn test_set_replaces_whole_value() {
        let cache: TieredCache<Vec<u32>> = TieredCache::new(HOUR);
        cache.set_at("k", vec![1, 2, 3], HOUR, t0());
        cache.set_at("k", vec![9], HOUR, t0());
        assert_eq!(cache.get_at("k", t0()), Some(vec![9]));
    }

    #[test]
    fn test_durable_hit_is_promoted() {
        let tmp = tempfile::tempdir().unwrap();
        let writer: TieredCache<String> =
            TieredCache::new(HOUR).with_durable(FileStore::new(tmp.path()));
        writer.set_at("k", "persisted".to_string(), HOUR, t0());

        // A fresh process sees only the durable tier.
        let reader: TieredCache<String> =
            TieredCache::new(HOUR).with_durable(FileStore::new(tmp.path()));
        assert_eq!(reader.get_at("k", t0()), Some("persisted".to_string()));

        // Once promoted, the fast tier answers even if the file is gone.
        fs::remove_file(tmp.path().join("k.cache.json")).unwrap();
        assert_eq!(reader.get_at("k", t0()), Some("persisted".to_string()));
    }

    #[test]
    fn test_expired_durable_record_is_deleted() {
        let tmp = tempfile::tempdir().unwrap();
        let writer: TieredCache<String> =
            TieredCache::new(HOUR).with_durable(FileStore::new(tmp.path()));
        writer.set_at("k", "old".to_string(), HOUR, t0());

        let reader: TieredCache<String> =
            TieredCache::new(HOUR).with_durable(FileStore::new(tmp.path()));
        assert_eq!(reader.get_at("k", t0() + TimeDelta::hours(2)), None);
        assert!(!tmp.path().join("k.cache.json").exists());
    }

    #[test]
    fn test_corrupt_durable_record_is_a_miss_and_removed() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("k.cache.json"), "{not json").unwrap();

        let cache: TieredCache<String> =
            TieredCache::new(HOUR).with_durable(FileStore::new(tmp.path()));
        assert_eq!(cache.get_at("k", t0()), None);
        assert!(!tmp.path().join("k.cache.json").exists());
    }

    #[test]
    fn test_durable_record_format() {
        let tmp = tempfile::tempdir().unwrap();
        let cache: TieredCache<u32> =
            TieredCache::new(HOUR).with_durable(FileStore::new(tmp.path()));
        cache.set_at("k", 7, HOUR, t0());

        let raw = fs::read_to_string(tmp.path().join("k.cache.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["value"], 7);
        assert_eq!(json["expiresAt"], (t0() + TimeDelta::hours(1)).timestamp_millis());
    }

    #[test]
    fn test_mirror_failure_does_not_affect_fast_tier() {
        let tmp = tempfile::tempdir().unwrap();
        let not_a_dir = tmp.path().join("file");
        fs::write(&not_a_dir, "occupied").unwrap();

        let cache: TieredCache<String> =
            TieredCache::new(HOUR).with_durable(FileStore::new(&not_a_dir));
        cache.set_at("k", "v".to_string(), HOUR, t0());
        assert_eq!(cache.get_at("k", t0()), Some("v".to_string()));
    }

    #[test]
    fn test_invalidate_and_status() {
        let tmp = tempfile::tempdir().unwrap();
        let cache: TieredCache<String> =
            TieredCache::new(HOUR).with_durable(FileStore::new(tmp.path()));
        cache.set_at("k", "v".to_string(), HOUR, t0());

        let status = cache.status_at("k", t0() + TimeDelta::minutes(15));
        assert!(status.cached);
        assert_eq!(status.remaining, Some(Duration::from_secs(45 * 60)));

        cache.invalidate("k");
        assert_eq!(cache.get_at("k", t0()), None);
        assert!(!tmp.path().join("k.cache.json").exists());
        assert_eq!(cache.status_at("k", t0()), CacheStatus::absent());
    }

    #[test]
    fn test_status_on_expired_entry_removes_it() {
        let cache: TieredCache<String> = TieredCache::new(HOUR);
        cache.set_at("k", "v".to_string(), HOUR, t0());
        assert!(!cache.status_at("k", t0() + TimeDelta::hours(1)).cached);
        assert_eq!(cache.get_at("k", t0()), None);
    }

    #[test]
    fn test_clear_empties_both_tiers() {
        let tmp = tempfile::tempdir().unwrap();
        let cache: TieredCache<String> =
            TieredCache::new(HOUR).with_durable(FileStore::new(tmp.path()));
        cache.set_at("a", "1".to_string(), HOUR, t0());
        cache.set_at("b", "2".to_string(), HOUR, t0());

        cache.clear();
        assert_eq!(cache.get_at("a", t0()), None);
        assert_eq!(cache.get_at("b", t0()), None);
    }
}
