// crates/elixir-terminology/src/cache.rs
// ============================================================================
// Module: TtlCache
// Description: Bounded time-to-live cache for terminology search results.
// Purpose: Absorb repeat lookups of common entity text within a protocol run
//          without re-issuing upstream vocabulary calls (spec.md §4.6.4).
// Dependencies: std::collections, tokio::sync::Mutex
// ============================================================================

//! ## Overview
//! Entries expire after a fixed TTL (default 300s) and the cache evicts its
//! oldest entry by insertion order once it holds more than `max_entries`
//! (default 1000) — a simple FIFO-as-LRU approximation, adequate for a cache
//! whose job is to deduplicate bursts of identical lookups within one
//! pipeline run rather than optimize long-run hit rate.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::collections::VecDeque;
use std::time::Duration;
use std::time::Instant;

use tokio::sync::Mutex;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default entry time-to-live (spec.md §4.6.4).
pub const DEFAULT_TTL_SECS: u64 = 300;

/// Default maximum resident entry count before FIFO eviction kicks in.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

// ============================================================================
// SECTION: TtlCache
// ============================================================================

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// A bounded, time-expiring cache keyed by `K`, storing values of type `V`.
pub struct TtlCache<K, V> {
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<(HashMap<K, Entry<V>>, VecDeque<K>)>,
}

impl<K, V> TtlCache<K, V>
where
    K: std::hash::Hash + Eq + Clone,
    V: Clone,
{
    /// Builds a cache with the spec's default TTL and capacity.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TTL_SECS), DEFAULT_MAX_ENTRIES)
    }

    /// Builds a cache with an explicit TTL and capacity.
    #[must_use]
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self { ttl, max_entries, entries: Mutex::new((HashMap::new(), VecDeque::new())) }
    }

    /// Returns a live (non-expired) cached value for `key`, if present.
    pub async fn get(&self, key: &K) -> Option<V> {
        let guard = self.entries.lock().await;
        let (map, _) = &*guard;
        let entry = map.get(key)?;
        if entry.inserted_at.elapsed() > self.ttl { None } else { Some(entry.value.clone()) }
    }

    /// Inserts or replaces the cached value for `key`, evicting the oldest
    /// entry first if the cache is at capacity.
    pub async fn put(&self, key: K, value: V) {
        let mut guard = self.entries.lock().await;
        let (map, order) = &mut *guard;
        if !map.contains_key(&key) {
            order.push_back(key.clone());
        }
        map.insert(key, Entry { value, inserted_at: Instant::now() });
        while map.len() > self.max_entries {
            if let Some(oldest) = order.pop_front() {
                map.remove(&oldest);
            } else {
                break;
            }
        }
    }

    /// Number of entries currently resident, expired or not.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_returns_the_value() {
        let cache: TtlCache<String, i32> = TtlCache::with_defaults();
        cache.put("a".to_string(), 1).await;
        assert_eq!(cache.get(&"a".to_string()).await, Some(1));
    }

    #[tokio::test]
    async fn expired_entry_is_not_returned() {
        let cache: TtlCache<String, i32> = TtlCache::new(Duration::from_millis(1), 10);
        cache.put("a".to_string(), 1).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(cache.get(&"a".to_string()).await, None);
    }

    #[tokio::test]
    async fn capacity_overflow_evicts_the_oldest_entry() {
        let cache: TtlCache<i32, i32> = TtlCache::new(Duration::from_secs(300), 2);
        cache.put(1, 1).await;
        cache.put(2, 2).await;
        cache.put(3, 3).await;
        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get(&1).await, None);
        assert_eq!(cache.get(&3).await, Some(3));
    }
}
