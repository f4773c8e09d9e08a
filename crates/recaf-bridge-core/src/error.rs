//! Error types for the bridge

use crate::mcp::McpError;
use crate::mcp::protocol::{McpRpcError, codes};
use thiserror::Error;

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Main error type for the bridge
#[derive(Error, Debug, Clone)]
pub enum BridgeError {
    /// A forwarding operation was attempted with no active backend
    #[error("Backend not connected")]
    NotConnected,

    /// Opening or initializing the backend failed
    #[error("Recaf MCP unavailable at {endpoint}: {source}")]
    BackendUnavailable {
        endpoint: String,
        #[source]
        source: McpError,
    },

    /// A call on an established backend session failed
    #[error(transparent)]
    Backend(#[from] McpError),

    /// The local transport failed
    #[error("Local transport error: {0}")]
    Transport(String),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The run was cancelled
    #[error("Bridge was cancelled")]
    Cancelled,
}

impl BridgeError {
    /// Create a new backend-unavailable error
    pub fn backend_unavailable(endpoint: impl Into<String>, source: McpError) -> Self {
        Self::BackendUnavailable {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// Create a new local transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// JSON-RPC error object reported to the local client
    pub fn to_rpc_error(&self) -> McpRpcError {
        match self {
            Self::NotConnected => McpRpcError::new(codes::SERVER_NOT_CONNECTED, self.to_string()),
            Self::Backend(e) => e.to_rpc_error(),
            other => McpRpcError::internal_error(other),
        }
    }
}

impl From<BridgeError> for McpRpcError {
    fn from(err: BridgeError) -> Self {
        err.to_rpc_error()
    }
}
