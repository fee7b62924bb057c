//! Bounded result cache for idempotent reads.
//!
//! Entries expire `ttl` after insertion. Eviction runs after every write:
//! expired entries go first, then, while the cache is over capacity, the
//! entries with the fewest hits (oldest first on ties). This approximates
//! LRU without a linked list.

use crate::config::CacheConfig;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Instant;
use tracing::debug;

/// One cached value.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// Cached value.
    pub value: V,
    /// When the value was stored.
    pub inserted_at: Instant,
    /// Number of hits since insertion.
    pub access_count: u64,
    seq: u64,
}

/// Statistics snapshot from a [`ResultCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Number of hits.
    pub hits: u64,
    /// Number of misses, expired lookups included.
    pub misses: u64,
    /// Number of evicted entries.
    pub evictions: u64,
    /// Current number of entries.
    pub entries: usize,
    /// Configured capacity.
    pub capacity: usize,
}

/// A TTL + access-count cache.
#[derive(Debug)]
pub struct ResultCache<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    config: CacheConfig,
    next_seq: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<K: Eq + Hash + Clone, V: Clone> ResultCache<K, V> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: HashMap::with_capacity(config.capacity),
            config,
            next_seq: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Looks up `key` at the current time.
    pub fn get(&mut self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Looks up `key` as of `now`.
    ///
    /// A hit requires `now - inserted_at < ttl` and bumps the entry's
    /// access count. An expired entry is dropped.
    pub fn get_at(&mut self, key: &K, now: Instant) -> Option<V> {
        let ttl = self.config.ttl;
        match self.entries.get_mut(key) {
            Some(entry) if now.saturating_duration_since(entry.inserted_at) < ttl => {
                entry.access_count += 1;
                self.hits += 1;
                Some(entry.value.clone())
            }
            Some(_) => {
                self.entries.remove(key);
                self.misses += 1;
                self.evictions += 1;
                None
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Stores `value` under `key` at the current time.
    pub fn insert(&mut self, key: K, value: V) {
        self.insert_at(key, value, Instant::now());
    }

    /// Stores `value` under `key` as of `now`, then evicts.
    ///
    /// Re-inserting an existing key resets its age and access count.
    pub fn insert_at(&mut self, key: K, value: V, now: Instant) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
                access_count: 0,
                seq,
            },
        );
        self.evict_at(now);
    }

    /// Runs eviction as of `now`, returning how many entries were removed.
    pub fn evict_at(&mut self, now: Instant) -> usize {
        let ttl = self.config.ttl;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.inserted_at) < ttl);
        let expired = before - self.entries.len();

        let mut pressured = 0;
        if self.entries.len() > self.config.capacity {
            let mut ranked: Vec<(u64, u64, K)> = self
                .entries
                .iter()
                .map(|(key, entry)| (entry.access_count, entry.seq, key.clone()))
                .collect();
            ranked.sort_unstable_by_key(|(count, seq, _)| (*count, *seq));

            let excess = self.entries.len() - self.config.capacity;
            for (_, _, key) in ranked.into_iter().take(excess) {
                self.entries.remove(&key);
                pressured += 1;
            }
        }

        let removed = expired + pressured;
        if removed > 0 {
            debug!(expired, pressured, remaining = self.entries.len(), "cache eviction");
        }
        self.evictions += removed as u64;
        removed
    }

    /// Returns true if `key` has an entry, expired or not.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Drops `key`.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|entry| entry.value)
    }

    /// Drops everything and resets statistics.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
        self.evictions = 0;
    }

    /// Number of entries, expired ones included until the next eviction.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns a statistics snapshot.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            entries: self.entries.len(),
            capacity: self.config.capacity,
        }
    }
}
