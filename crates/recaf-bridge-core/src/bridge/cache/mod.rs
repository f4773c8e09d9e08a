//! Metadata cache
//!
//! Holds the last tools and resources listings fetched from the active
//! backend. The cache never reads the clock itself: callers pass `now` in, so
//! freshness is decided by whoever owns the timeline.

mod kind;
mod metadata;
mod types;


pub use kind::{MetadataKind, Resources, Slot, Tools};
pub use metadata::MetadataCache;
pub use types::{CacheEntry, CacheStats};
