//! The backend seam
//!
//! The session manager only ever talks to a [`Backend`]; the production
//! implementation wraps an [`McpClient`](crate::mcp::McpClient) over Streamable
//! HTTP, tests substitute fakes.

use crate::mcp::McpError;
use crate::mcp::types::{McpResource, McpResourceContent, McpServerInfo, McpTool, McpToolResult};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// An open session with the remote MCP service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Backend: Send + Sync {
    /// Perform the initialize handshake
    async fn initialize(&self) -> Result<McpServerInfo, McpError>;

    /// Full tool listing
    async fn list_tools(&self) -> Result<Vec<McpTool>, McpError>;

    /// Invoke a tool with the caller's arguments
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpToolResult, McpError>;

    /// Full resource listing
    async fn list_resources(&self) -> Result<Vec<McpResource>, McpError>;

    /// Every content item of a resource, in server order
    async fn read_resource(&self, uri: &str) -> Result<Vec<McpResourceContent>, McpError>;

    /// Tear the session down
    async fn close(&self) -> Result<(), McpError> {
        Ok(())
    }
}

/// Shared handle to the active backend
///
/// Two handles denote the same session exactly when they point at the same
/// allocation.
pub type BackendHandle = Arc<dyn Backend>;

/// Whether two optional handles denote the same session
pub(crate) fn same_backend(a: Option<&BackendHandle>, b: Option<&BackendHandle>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}
