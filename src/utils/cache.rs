//! High-Performance In-Memory Cache Module
//!
//! Thread-safe response cache for upstream payloads, with stale fallback.
//! Uses DashMap for concurrent access without a global lock.
//!
//! Features:
//! - Per-key-class TTL and stale window
//! - Fresh / stale / raw lookups
//! - LRU eviction once `capacity` keys are cached
//! - Hit / miss / stale / eviction counters
//! - Key normalization (scheme + host lowercase, sorted query)

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::models::config::CachePolicy;
use crate::utils::constants::DEFAULT_CACHE_CAPACITY;

/// Last successful payload for one key
#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: V,
    /// When `value` was obtained
    pub fetched_at: Instant,
    pub ttl: Duration,
    /// How long past `ttl` the value may be served as a fallback (`None` = forever)
    pub stale_window: Option<Duration>,
    last_access: Instant,
}

impl<V> CacheEntry<V> {
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.fetched_at)
    }

    /// `now - fetched_at < ttl`
    pub fn is_fresh(&self, now: Instant) -> bool {
        self.age(now) < self.ttl
    }

    /// Still allowed as a fallback after a failed refresh
    pub fn is_servable_stale(&self, now: Instant) -> bool {
        match self.stale_window {
            Some(window) => self.age(now) < self.ttl.saturating_add(window),
            None => true,
        }
    }
}

/// Process-wide response cache, cheap to clone (shared storage)
#[derive(Clone)]
pub struct TtlCache<V> {
    /// Internal storage: normalized key -> CacheEntry
    store: Arc<DashMap<String, CacheEntry<V>>>,
    /// Policy used by `put`
    default_policy: CachePolicy,
    capacity: usize,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    stale_hits: Arc<AtomicU64>,
    evictions: Arc<AtomicU64>,
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Cache bounded to `capacity` keys (least recently used evicted first)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            default_policy: CachePolicy::default(),
            capacity: capacity.max(1),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            stale_hits: Arc::new(AtomicU64::new(0)),
            evictions: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Replace the policy `put` applies
    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.default_policy = policy;
        self
    }

    /// Pure lookup, no freshness judgment and no bookkeeping
    pub fn get(&self, key: &str) -> Option<CacheEntry<V>> {
        self.store.get(key).map(|entry| entry.value().clone())
    }

    /// Entry only if `now - fetched_at < ttl`
    pub fn get_if_fresh(&self, key: &str, now: Instant) -> Option<CacheEntry<V>> {
        match self.store.get_mut(key) {
            Some(mut entry) if entry.is_fresh(now) => {
                entry.last_access = now;
                self.hits.fetch_add(1, Ordering::Relaxed);
                let remaining = entry.ttl.saturating_sub(entry.age(now));
                debug!("✅ CACHE HIT: {} (TTL: {}s remaining)", key, remaining.as_secs());
                Some(entry.value().clone())
            }
            Some(_) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("📭 CACHE MISS (expired): {}", key);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("📭 CACHE MISS: {}", key);
                None
            }
        }
    }

    /// Whatever exists regardless of age; for the fallback path only.
    ///
    /// Only entries past their TTL but inside their stale window count as
    /// stale hits at `now`.
    pub fn get_stale(&self, key: &str, now: Instant) -> Option<CacheEntry<V>> {
        let mut entry = self.store.get_mut(key)?;
        entry.last_access = now;
        if !entry.is_fresh(now) && entry.is_servable_stale(now) {
            self.stale_hits.fetch_add(1, Ordering::Relaxed);
        }
        Some(entry.value().clone())
    }

    /// Store with the cache's default policy
    pub fn put(&self, key: &str, value: V, now: Instant) {
        let policy = self.default_policy;
        self.put_with_policy(key, value, &policy, now);
    }

    /// Replace `value` + `fetched_at` for `key` in one insert (last write wins)
    pub fn put_with_policy(&self, key: &str, value: V, policy: &CachePolicy, now: Instant) {
        if !self.store.contains_key(key) && self.store.len() >= self.capacity {
            self.evict_lru();
        }

        let entry = CacheEntry {
            key: key.to_string(),
            value,
            fetched_at: now,
            ttl: policy.ttl,
            stale_window: policy.stale_window,
            last_access: now,
        };

        self.store.insert(key.to_string(), entry);
        info!("💾 CACHE SET: {} (TTL: {}s)", key, policy.ttl.as_secs());
    }

    /// Drop the least recently used entry.
    ///
    /// Concurrent inserts of distinct new keys may overshoot `capacity` by
    /// the number of racing writers; the next insert brings it back down.
    fn evict_lru(&self) {
        let victim = self
            .store
            .iter()
            .min_by_key(|entry| entry.last_access)
            .map(|entry| entry.key().clone());

        if let Some(key) = victim {
            if self.store.remove(&key).is_some() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!("🗑️ CACHE EVICT (LRU): {}", key);
            }
        }
    }

    /// Remove entries whose stale window has elapsed; returns how many
    pub fn purge_unservable(&self, now: Instant) -> usize {
        let before = self.store.len();
        self.store.retain(|_, entry| entry.is_servable_stale(now));
        let removed = before.saturating_sub(self.store.len());
        if removed > 0 {
            info!("🧹 CACHE PURGE: {} entries past their stale window removed", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        CacheStats {
            entries: self.store.len(),
            capacity: self.capacity,
            hits,
            misses,
            stale_hits: self.stale_hits.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            hit_rate,
        }
    }
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    /// Lookups on the fallback path that found a value
    pub stale_hits: u64,
    pub evictions: u64,
    pub hit_rate: f64,
}

/// Normalize an upstream URL plus extra query parameters into a cache key.
///
/// Scheme and host are lowercased, the fragment is dropped, and all query
/// pairs are sorted. Inputs that are not URLs (logical keys) are trimmed
/// and used as-is.
pub fn normalize_key(url: &str, params: &[(&str, &str)]) -> String {
    let trimmed = url.trim();
    let Ok(mut parsed) = reqwest::Url::parse(trimmed) else {
        return trimmed.to_string();
    };

    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .into_owned()
        .chain(params.iter().map(|(k, v)| (k.to_string(), v.to_string())))
        .collect();
    pairs.sort();

    parsed.set_fragment(None);
    if pairs.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(pairs);
    }
    parsed.to_string()
}
