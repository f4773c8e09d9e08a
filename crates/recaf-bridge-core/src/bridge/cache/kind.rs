//! The two kinds of cached metadata

use super::{CacheEntry, MetadataCache};
use crate::bridge::backend::Backend;
use crate::mcp::McpError;
use crate::mcp::types::{McpResource, McpTool};
use futures::future::BoxFuture;
use std::fmt;

/// Identifies one of the cache's two slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Tools,
    Resources,
}

impl Slot {
    pub(crate) const ALL: [Slot; 2] = [Slot::Tools, Slot::Resources];

    pub(crate) fn index(self) -> usize {
        match self {
            Slot::Tools => 0,
            Slot::Resources => 1,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Tools => write!(f, "tools"),
            Slot::Resources => write!(f, "resources"),
        }
    }
}

/// A cacheable listing: which slot it lives in and how to fetch it
pub trait MetadataKind: Send + Sync + 'static {
    /// Element type of the listing
    type Item: Clone + Send + Sync + 'static;

    /// Name used in log lines
    const NAME: &'static str;

    /// The slot holding this listing
    const SLOT: Slot;

    fn slot(cache: &MetadataCache) -> &Option<CacheEntry<Self::Item>>;

    fn slot_mut(cache: &mut MetadataCache) -> &mut Option<CacheEntry<Self::Item>>;

    /// Fetch the full listing from `backend`
    fn fetch(backend: &dyn Backend) -> BoxFuture<'_, Result<Vec<Self::Item>, McpError>>;
}

/// The `tools/list` listing
#[derive(Debug)]
pub struct Tools;

/// The `resources/list` listing
#[derive(Debug)]
pub struct Resources;

impl MetadataKind for Tools {
    type Item = McpTool;
    const NAME: &'static str = "tools";
    const SLOT: Slot = Slot::Tools;

    fn slot(cache: &MetadataCache) -> &Option<CacheEntry<McpTool>> {
        &cache.tools
    }

    fn slot_mut(cache: &mut MetadataCache) -> &mut Option<CacheEntry<McpTool>> {
        &mut cache.tools
    }

    fn fetch(backend: &dyn Backend) -> BoxFuture<'_, Result<Vec<McpTool>, McpError>> {
        backend.list_tools()
    }
}

impl MetadataKind for Resources {
    type Item = McpResource;
    const NAME: &'static str = "resources";
    const SLOT: Slot = Slot::Resources;

    fn slot(cache: &MetadataCache) -> &Option<CacheEntry<McpResource>> {
        &cache.resources
    }

    fn slot_mut(cache: &mut MetadataCache) -> &mut Option<CacheEntry<McpResource>> {
        &mut cache.resources
    }

    fn fetch(backend: &dyn Backend) -> BoxFuture<'_, Result<Vec<McpResource>, McpError>> {
        backend.list_resources()
    }
}
