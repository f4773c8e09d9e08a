//! Session manager
//!
//! Owns the active backend handle together with the metadata cache and
//! exposes the four forwarding operations. Handle and cache are swapped under
//! one lock, so nobody ever sees a new backend paired with the old backend's
//! listings.

mod payload;


pub use payload::{BLOB_MIME_TYPE, ResourcePayload, TEXT_MIME_TYPE};

use super::backend::{BackendHandle, same_backend};
use super::cache::{MetadataCache, MetadataKind, Resources, Slot, Tools};
use crate::config::METADATA_CACHE_TTL;
use crate::error::{BridgeError, BridgeResult};
use crate::mcp::types::{McpResource, McpTool, McpToolResult};
use parking_lot::RwLock;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tracing::{debug, instrument};

struct SessionState {
    backend: Option<BackendHandle>,
    /// Bumped on every handle change; fetches only publish into the
    /// generation they started in.
    generation: u64,
    cache: MetadataCache,
}

enum Lookup<T> {
    Hit(Vec<T>),
    Miss {
        backend: BackendHandle,
        generation: u64,
    },
}

/// Bridge-side state shared by the front end and the lifecycle driver
pub struct SessionManager {
    state: RwLock<SessionState>,
    ttl: Duration,
    /// One in-flight listing fetch per slot
    flights: [AsyncMutex<()>; 2],
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    /// Create a session manager with the default cache TTL
    pub fn new() -> Self {
        Self::with_ttl(METADATA_CACHE_TTL)
    }

    /// Create a session manager with a custom cache TTL
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            state: RwLock::new(SessionState {
                backend: None,
                generation: 0,
                cache: MetadataCache::new(),
            }),
            ttl,
            flights: [AsyncMutex::new(()), AsyncMutex::new(())],
        }
    }

    /// Replace the active backend, returning the resulting generation.
    ///
    /// Any change of identity clears both cache slots before this returns.
    /// Passing the handle that is already active is a no-op.
    pub fn set_backend(&self, backend: Option<BackendHandle>) -> u64 {
        let mut state = self.state.write();
        if same_backend(state.backend.as_ref(), backend.as_ref()) {
            return state.generation;
        }

        state.generation += 1;
        state.cache.clear();
        debug!(
            generation = state.generation,
            connected = backend.is_some(),
            "Backend replaced"
        );
        let previous = std::mem::replace(&mut state.backend, backend);
        let generation = state.generation;
        drop(state);
        drop(previous);
        generation
    }

    /// Whether a backend is active
    pub fn is_connected(&self) -> bool {
        self.state.read().backend.is_some()
    }

    /// Current generation counter
    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    /// Tool listing, served from the cache while fresh
    pub async fn list_tools(&self) -> BridgeResult<Vec<McpTool>> {
        self.list::<Tools>().await
    }

    /// Resource listing, served from the cache while fresh
    pub async fn list_resources(&self) -> BridgeResult<Vec<McpResource>> {
        self.list::<Resources>().await
    }

    /// Forward a tool call unchanged
    #[instrument(skip(self, arguments), level = "debug")]
    pub async fn call_tool(&self, name: &str, arguments: Value) -> BridgeResult<McpToolResult> {
        let backend = self.backend()?;
        Ok(backend.call_tool(name, arguments).await?)
    }

    /// Read a resource and reduce it to a single payload
    #[instrument(skip(self), level = "debug")]
    pub async fn read_resource(&self, uri: &str) -> BridgeResult<ResourcePayload> {
        let backend = self.backend()?;
        let contents = backend.read_resource(uri).await?;
        Ok(ResourcePayload::from_contents(contents))
    }

    /// Drop the entry in `slot` if `generation` is still current.
    ///
    /// Returns whether the generation matched.
    pub fn invalidate(&self, slot: Slot, generation: u64) -> bool {
        let mut state = self.state.write();
        if state.generation != generation {
            return false;
        }
        state.cache.invalidate_slot(slot);
        true
    }

    /// When the cached listing for `K` was captured, if there is one
    pub fn captured_at<K: MetadataKind>(&self) -> Option<Instant> {
        self.state.read().cache.get::<K>().map(|entry| entry.captured_at)
    }

    /// Log the cache counters at debug level
    pub fn log_cache_stats(&self) {
        let state = self.state.read();
        let stats = state.cache.stats();
        debug!(
            hits = stats.hits(),
            misses = stats.misses(),
            evictions = stats.evictions(),
            "Metadata cache hit rate {:.1}%",
            stats.hit_rate()
        );
    }

    /// (hits, misses, evictions) so far
    pub fn cache_counters(&self) -> (u64, u64, u64) {
        let state = self.state.read();
        let stats = state.cache.stats();
        (stats.hits(), stats.misses(), stats.evictions())
    }

    fn backend(&self) -> BridgeResult<BackendHandle> {
        self.state
            .read()
            .backend
            .clone()
            .ok_or(BridgeError::NotConnected)
    }

    fn lookup<K: MetadataKind>(&self) -> BridgeResult<Lookup<K::Item>> {
        let state = self.state.read();
        let backend = state.backend.clone().ok_or(BridgeError::NotConnected)?;

        match state.cache.get_fresh::<K>(Instant::now(), self.ttl) {
            Some(items) => {
                state.cache.stats().record_hit();
                debug!("Serving {} from cache", K::NAME);
                Ok(Lookup::Hit(items))
            }
            None => Ok(Lookup::Miss {
                backend,
                generation: state.generation,
            }),
        }
    }

    async fn list<K: MetadataKind>(&self) -> BridgeResult<Vec<K::Item>> {
        if let Lookup::Hit(items) = self.lookup::<K>()? {
            return Ok(items);
        }

        let _flight = self.flights[K::SLOT.index()].lock().await;

        // Whoever held the flight may have just filled the slot
        let (backend, generation) = match self.lookup::<K>()? {
            Lookup::Hit(items) => return Ok(items),
            Lookup::Miss {
                backend,
                generation,
            } => (backend, generation),
        };

        debug!("Fetching {} from backend", K::NAME);
        self.state.read().cache.stats().record_miss();
        let items = K::fetch(backend.as_ref()).await?;

        let mut state = self.state.write();
        if state.generation == generation {
            state.cache.put::<K>(items.clone(), Instant::now());
        } else {
            debug!("Backend changed during {} fetch, not caching", K::NAME);
        }

        Ok(items)
    }
}
