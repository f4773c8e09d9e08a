//! MCP transport layer implementations
//!
//! ## Available Transports
//!
//! - **HTTP**: Streamable HTTP client transport, used to reach the backend
//! - **Stdio**: newline-delimited JSON over any async byte stream, used to
//!   serve the local client

pub mod http;
pub mod stdio;

pub use http::{HttpTransport, HttpTransportConfig};
pub use stdio::StdioTransport;

use super::error::McpError;
use super::protocol::McpMessage;
use async_trait::async_trait;

/// Transport trait for MCP communication
///
/// Methods take `&self` so one task can block in [`McpTransport::receive`]
/// while others keep sending.
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Send a message
    async fn send(&self, message: McpMessage) -> Result<(), McpError>;

    /// Receive the next inbound message
    async fn receive(&self) -> Result<McpMessage, McpError>;

    /// Close the transport
    async fn close(&self) -> Result<(), McpError>;

    /// Check if the transport is connected
    fn is_connected(&self) -> bool;
}
