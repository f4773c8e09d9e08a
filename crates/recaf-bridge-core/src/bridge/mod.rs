//! The bridge proper
//!
//! ```text
//! local client --stdio--> FrontEnd --> SessionManager --> Backend --HTTP--> Recaf
//!                                          |
//!                                    MetadataCache
//! ```
//!
//! [`Bridge`] wires these together for one backend connection.

pub mod backend;
pub mod cache;
pub mod connector;
pub mod front_end;
pub mod lifecycle;
pub mod session;

pub use backend::{Backend, BackendHandle};
pub use cache::{CacheEntry, CacheStats, MetadataCache, MetadataKind, Resources, Slot, Tools};
pub use connector::{Connector, HttpBackend, HttpConnector};
pub use front_end::{BRIDGE_SERVER_NAME, FrontEnd, handle_request};
pub use lifecycle::{BackendLease, Bridge, LifecycleState};
pub use session::{ResourcePayload, SessionManager};
