//! Cache entry and statistics types

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// One cached listing
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// The listing, in backend order
    pub value: Vec<T>,
    /// When the listing was fetched
    pub captured_at: Instant,
}

impl<T> CacheEntry<T> {
    /// Create a new cache entry
    pub fn new(value: Vec<T>, captured_at: Instant) -> Self {
        Self { value, captured_at }
    }

    /// Whether the entry is still within `ttl` at `now`
    pub fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.captured_at) < ttl
    }
}

/// Cache statistics
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Listings served from the cache
    pub hits: AtomicU64,
    /// Listings that had to go to the backend
    pub misses: AtomicU64,
    /// Entries dropped by a backend swap or a change notification
    pub evictions: AtomicU64,
}

impl CacheStats {
    /// Get total hits
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Get total misses
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Get total evictions
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Get hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            (hits / total) * 100.0
        }
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }
}
