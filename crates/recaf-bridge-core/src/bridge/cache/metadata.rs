//! Two-slot metadata cache

use super::kind::{MetadataKind, Resources, Slot, Tools};
use super::types::{CacheEntry, CacheStats};
use crate::mcp::types::{McpResource, McpTool};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Cache for the tools and resources listings
#[derive(Debug, Default)]
pub struct MetadataCache {
    pub(super) tools: Option<CacheEntry<McpTool>>,
    pub(super) resources: Option<CacheEntry<McpResource>>,
    stats: CacheStats,
}

impl MetadataCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw entry for `K`, fresh or not
    pub fn get<K: MetadataKind>(&self) -> Option<&CacheEntry<K::Item>> {
        K::slot(self).as_ref()
    }

    /// Listing for `K` if it was captured less than `ttl` before `now`
    pub fn get_fresh<K: MetadataKind>(&self, now: Instant, ttl: Duration) -> Option<Vec<K::Item>> {
        self.get::<K>()
            .filter(|entry| entry.is_fresh(now, ttl))
            .map(|entry| entry.value.clone())
    }

    /// Store a listing for `K` captured at `now`
    pub fn put<K: MetadataKind>(&mut self, value: Vec<K::Item>, now: Instant) {
        debug!("Cached {} {}", value.len(), K::NAME);
        *K::slot_mut(self) = Some(CacheEntry::new(value, now));
    }

    /// Drop the entry for `K`
    pub fn invalidate<K: MetadataKind>(&mut self) {
        self.invalidate_slot(K::SLOT);
    }

    /// Drop the entry in `slot`
    pub fn invalidate_slot(&mut self, slot: Slot) {
        let removed = match slot {
            Slot::Tools => self.tools.take().is_some(),
            Slot::Resources => self.resources.take().is_some(),
        };
        if removed {
            self.stats.record_eviction();
            debug!("Invalidated {} cache", slot);
        }
    }

    /// Drop both entries
    pub fn clear(&mut self) {
        for slot in Slot::ALL {
            self.invalidate_slot(slot);
        }
    }

    /// Whether neither slot holds an entry
    pub fn is_empty(&self) -> bool {
        self.get::<Tools>().is_none() && self.get::<Resources>().is_none()
    }

    /// Hit/miss/eviction counters
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}
