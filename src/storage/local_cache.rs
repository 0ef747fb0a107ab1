// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Timestamped snapshot cache for list screens.
//!
//! Entries live in a durable [`KeyValueStore`] and are never evicted: a
//! stale snapshot is still returned, with `is_stale` set, because showing
//! last-known data offline beats showing nothing. A small LRU memo fronts
//! the durable store for hot reads; dropping a memo entry never drops data.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::secure_store::KeyValueStore;
use crate::config::DEFAULT_CACHE_FRESHNESS;

/// Namespace for cache keys in the shared store.
pub const CACHE_PREFIX: &str = "step_mobile_cache_";

const DEFAULT_MEMO_CAPACITY: usize = 32;

/// Durable representation of one cached snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    timestamp: DateTime<Utc>,
    data: Value,
}

/// A cached payload together with its age.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedValue<T> {
    pub value: T,
    pub timestamp: DateTime<Utc>,
    pub is_stale: bool,
}

pub struct LocalCache {
    store: Arc<dyn KeyValueStore>,
    memo: Mutex<LruCache<String, StoredEntry>>,
    freshness: Duration,
}

impl LocalCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_freshness(store, DEFAULT_CACHE_FRESHNESS)
    }

    pub fn with_freshness(store: Arc<dyn KeyValueStore>, freshness: Duration) -> Self {
        Self {
            store,
            memo: Mutex::new(LruCache::new(
                NonZeroUsize::new(DEFAULT_MEMO_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            )),
            freshness,
        }
    }

    /// Store `value` under `key` stamped with the current time. Failures are
    /// logged and swallowed.
    pub async fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let data = match serde_json::to_value(value) {
            Ok(data) => data,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to serialize cache entry");
                return;
            }
        };
        let entry = StoredEntry {
            timestamp: Utc::now(),
            data,
        };

        if let Ok(mut memo) = self.memo.lock() {
            memo.put(key.to_string(), entry.clone());
        }

        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to encode cache entry");
                return;
            }
        };
        if let Err(e) = self.store.set(&storage_key(key), &raw).await {
            warn!(key = %key, error = %e, "Failed to cache data");
        }
    }

    /// Cached payload for `key`, whatever its age.
    pub async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.read_entry(key).await.map(|entry| entry.value)
    }

    /// Cached payload plus timestamp and staleness flag.
    pub async fn read_entry<T: DeserializeOwned>(&self, key: &str) -> Option<CachedValue<T>> {
        let entry = self.load(key).await?;
        let is_stale = self.is_stale(entry.timestamp);
        match serde_json::from_value(entry.data) {
            Ok(value) => Some(CachedValue {
                value,
                timestamp: entry.timestamp,
                is_stale,
            }),
            Err(e) => {
                warn!(key = %key, error = %e, "Cached data does not match requested type");
                None
            }
        }
    }

    fn is_stale(&self, timestamp: DateTime<Utc>) -> bool {
        let age = (Utc::now() - timestamp).to_std().unwrap_or(Duration::ZERO);
        age > self.freshness
    }

    async fn load(&self, key: &str) -> Option<StoredEntry> {
        if let Ok(mut memo) = self.memo.lock() {
            if let Some(entry) = memo.get(key) {
                return Some(entry.clone());
            }
        }

        let raw = match self.store.get(&storage_key(key)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to retrieve cached data");
                return None;
            }
        };

        let entry: StoredEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %key, error = %e, "Corrupt cache entry ignored");
                return None;
            }
        };

        if let Ok(mut memo) = self.memo.lock() {
            memo.put(key.to_string(), entry.clone());
        }
        Some(entry)
    }
}

fn storage_key(key: &str) -> String {
    format!("{CACHE_PREFIX}{key}")
}
