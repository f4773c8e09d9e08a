//! Recaf MCP Bridge Core Library
//!
//! Lets an MCP client that only speaks newline-delimited JSON-RPC over stdio
//! reach a Recaf MCP server that only speaks Streamable HTTP. Tool and
//! resource listings are cached for a short TTL and dropped whenever the
//! backend connection changes.

pub mod bridge;
pub mod config;
pub mod error;
pub mod mcp;

// Re-export commonly used types
pub use bridge::{
    Backend, BackendHandle, Bridge, Connector, FrontEnd, HttpConnector, LifecycleState,
    ResourcePayload, SessionManager,
};
pub use config::{
    BACKEND_CLOSE_TIMEOUT, BridgeConfig, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_HOST, DEFAULT_PORT, METADATA_CACHE_TTL,
};
pub use error::{BridgeError, BridgeResult};
pub use mcp::{McpClient, McpError, McpTransport, StdioTransport};
