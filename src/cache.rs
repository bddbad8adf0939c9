// src/cache.rs
//! Durable TTL cache over two JSON-file namespaces.
//!
//! Consensus results and raw scrape observations age at different rates, so
//! each namespace carries its own TTL and its own file. Entries are never
//! eagerly evicted: a stale entry is ignored on read and overwritten by the
//! next successful fetch. A file that fails to parse on load is logged and
//! replaced by an empty map rather than failing startup.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::fusion::ConsensusResult;
use crate::observation::{Observation, SourceFamily};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub payload: T,
    pub captured_at: DateTime<Utc>,
}

/// One persisted key/value map with a fixed TTL.
pub struct Namespace<T> {
    path: PathBuf,
    ttl: Duration,
    inner: Mutex<HashMap<String, CacheEntry<T>>>,
}

impl<T: Serialize + DeserializeOwned + Clone> Namespace<T> {
    /// Load the map from `path`, falling back to empty on a missing or
    /// corrupted file.
    pub fn open(path: PathBuf, ttl: Duration) -> Self {
        let map = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "cache file corrupted, starting from empty"
                    );
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self {
            path,
            ttl,
            inner: Mutex::new(map),
        }
    }

    /// Fresh payload for `key`, or `None` on miss/expiry as of `now`.
    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<T> {
        let map = self.inner.lock().expect("cache mutex poisoned");
        let entry = map.get(key)?;
        if now - entry.captured_at > self.ttl {
            return None;
        }
        Some(entry.payload.clone())
    }

    pub fn get(&self, key: &str) -> Option<T> {
        self.get_at(key, Utc::now())
    }

    /// Insert (overwriting any prior entry) and persist the whole map. The
    /// lock is held across the file write so concurrent writers cannot
    /// interleave partial states on disk.
    pub fn put(&self, key: &str, payload: T) -> Result<()> {
        self.put_at(key, payload, Utc::now())
    }

    pub fn put_at(&self, key: &str, payload: T, captured_at: DateTime<Utc>) -> Result<()> {
        let mut map = self.inner.lock().expect("cache mutex poisoned");
        map.insert(
            key.to_string(),
            CacheEntry {
                payload,
                captured_at,
            },
        );
        let json = serde_json::to_string(&*map).context("serializing cache map")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("writing cache file {}", self.path.display()))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Both namespaces, rooted in one cache directory.
pub struct CacheStore {
    pub consensus: Namespace<ConsensusResult>,
    pub scrape: Namespace<Observation>,
}

impl CacheStore {
    pub fn open(dir: &Path, consensus_ttl_days: i64, scrape_ttl_hours: i64) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating cache dir {}", dir.display()))?;
        Ok(Self {
            consensus: Namespace::open(
                dir.join("market_prices.json"),
                Duration::days(consensus_ttl_days.max(0)),
            ),
            scrape: Namespace::open(
                dir.join("scrape_pages.json"),
                Duration::hours(scrape_ttl_hours.max(0)),
            ),
        })
    }

    /// Scrape entries are additionally keyed by family.
    pub fn scrape_key(family: SourceFamily, query: &str) -> String {
        format!("{}:{}", family.as_str(), query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::ConsensusResult;

    fn ns(dir: &Path, ttl: Duration) -> Namespace<ConsensusResult> {
        Namespace::open(dir.join("test.json"), ttl)
    }

    #[test]
    fn hit_before_ttl_miss_after() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ns(dir.path(), Duration::hours(1));
        let t0 = Utc::now();
        let result = ConsensusResult::no_data();
        cache.put_at("fender stratocaster", result.clone(), t0).unwrap();

        let just_before = t0 + Duration::hours(1);
        let just_after = t0 + Duration::hours(1) + Duration::seconds(1);
        assert_eq!(cache.get_at("fender stratocaster", just_before), Some(result));
        assert_eq!(cache.get_at("fender stratocaster", just_after), None);
        // Stale entries are ignored, not evicted.
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn put_overwrites_and_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.json");
        {
            let cache: Namespace<ConsensusResult> =
                Namespace::open(path.clone(), Duration::days(1));
            let mut r = ConsensusResult::no_data();
            cache.put("key", r.clone()).unwrap();
            r.average_price = 42.0;
            cache.put("key", r).unwrap();
        }
        let reloaded: Namespace<ConsensusResult> = Namespace::open(path, Duration::days(1));
        assert_eq!(reloaded.get("key").unwrap().average_price, 42.0);
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn corrupted_file_resets_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.json");
        std::fs::write(&path, "{not valid json").unwrap();
        let cache: Namespace<ConsensusResult> =
            Namespace::open(path.clone(), Duration::days(1));
        assert!(cache.is_empty());
        // And the store remains usable.
        cache.put("key", ConsensusResult::no_data()).unwrap();
        assert!(cache.get("key").is_some());
    }

    #[test]
    fn scrape_keys_are_family_scoped() {
        assert_eq!(
            CacheStore::scrape_key(SourceFamily::Ebay, "gibson sg"),
            "ebay:gibson sg"
        );
        assert_ne!(
            CacheStore::scrape_key(SourceFamily::Ebay, "gibson sg"),
            CacheStore::scrape_key(SourceFamily::Reverb, "gibson sg")
        );
    }
}
