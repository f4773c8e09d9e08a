//! Model Context Protocol (MCP) plumbing
//!
//! Everything the bridge needs to speak MCP on both of its sides: the wire
//! messages, the two transports, and a client for the upstream server.
//!
//! ## Example
//!
//! ```rust,ignore
//! use recaf_bridge_core::mcp::{HttpTransport, HttpTransportConfig, McpClient};
//!
//! let transport = HttpTransport::new(HttpTransportConfig::new("http://localhost:8085/mcp"))?;
//! let client = McpClient::new(Arc::new(transport));
//! client.initialize().await?;
//!
//! let tools = client.list_tools().await?;
//! ```

pub mod client;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod types;

pub use client::{LoggingNotificationHandler, McpClient, NotificationHandler};
pub use error::McpError;
pub use protocol::{
    MCP_PROTOCOL_VERSION, McpMessage, McpNotification, McpRequest, McpResponse, McpRpcError,
    RequestId,
};
pub use transport::{HttpTransport, HttpTransportConfig, McpTransport, StdioTransport};
pub use types::{
    McpCapabilities, McpResource, McpResourceContent, McpServerInfo, McpTool, McpToolResult,
};
