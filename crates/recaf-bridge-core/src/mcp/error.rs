//! MCP error types

use super::protocol::{McpRpcError, RequestId, codes};
use std::time::Duration;
use thiserror::Error;

/// MCP-specific errors
#[derive(Debug, Error, Clone)]
pub enum McpError {
    /// Connection error
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        context: Option<String>,
    },

    /// Protocol error
    #[error("Protocol error: {message}")]
    Protocol {
        message: String,
        context: Option<String>,
    },

    /// Transport error
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        context: Option<String>,
    },

    /// Error reported by the remote side, with its JSON-RPC code
    #[error("Server error {code}: {message}")]
    Server {
        code: i32,
        message: String,
        data: Option<serde_json::Value>,
        context: Option<String>,
    },

    /// Invalid request
    #[error("Invalid request: {message}")]
    InvalidRequest {
        message: String,
        context: Option<String>,
    },

    /// Valid JSON that is not a JSON-RPC message; keeps the id when one was readable
    #[error("Invalid message: {message}")]
    InvalidMessage {
        message: String,
        id: Option<RequestId>,
        context: Option<String>,
    },

    /// Timeout
    #[error("Request timeout after {millis} ms")]
    Timeout {
        millis: u64,
        context: Option<String>,
    },

    /// Serialization error
    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        context: Option<String>,
    },

    /// Not initialized
    #[error("Client not initialized")]
    NotInitialized,

    /// Already initialized
    #[error("Client already initialized")]
    AlreadyInitialized,

    /// Cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// Other error
    #[error("MCP error: {message}")]
    Other {
        message: String,
        context: Option<String>,
    },
}

impl McpError {
    /// Create a new Connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            context: None,
        }
    }

    /// Create a new Protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
            context: None,
        }
    }

    /// Create a new Transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            context: None,
        }
    }

    /// Create a new Server error
    pub fn server(code: i32, message: impl Into<String>) -> Self {
        Self::Server {
            code,
            message: message.into(),
            data: None,
            context: None,
        }
    }

    /// Create a new InvalidRequest error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            context: None,
        }
    }

    /// Create a new InvalidMessage error
    pub fn invalid_message(message: impl Into<String>, id: Option<RequestId>) -> Self {
        Self::InvalidMessage {
            message: message.into(),
            id,
            context: None,
        }
    }

    /// Create a new Timeout error
    pub fn timeout(limit: Duration) -> Self {
        Self::Timeout {
            millis: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            context: None,
        }
    }

    /// Create a new Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
            context: None,
        }
    }

    /// Create a new Other error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
            context: None,
        }
    }

    /// Add context to any MCP error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        let ctx = Some(context.into());
        match &mut self {
            Self::Connection { context: c, .. } => *c = ctx,
            Self::Protocol { context: c, .. } => *c = ctx,
            Self::Transport { context: c, .. } => *c = ctx,
            Self::Server { context: c, .. } => *c = ctx,
            Self::InvalidRequest { context: c, .. } => *c = ctx,
            Self::InvalidMessage { context: c, .. } => *c = ctx,
            Self::Timeout { context: c, .. } => *c = ctx,
            Self::Serialization { context: c, .. } => *c = ctx,
            Self::Other { context: c, .. } => *c = ctx,
            Self::NotInitialized | Self::AlreadyInitialized | Self::Cancelled => {}
        }
        self
    }

    /// Context attached with [`McpError::with_context`], if any
    pub fn context(&self) -> Option<&str> {
        match self {
            Self::Connection { context, .. }
            | Self::Protocol { context, .. }
            | Self::Transport { context, .. }
            | Self::Server { context, .. }
            | Self::InvalidRequest { context, .. }
            | Self::InvalidMessage { context, .. }
            | Self::Timeout { context, .. }
            | Self::Serialization { context, .. }
            | Self::Other { context, .. } => context.as_deref(),
            Self::NotInitialized | Self::AlreadyInitialized | Self::Cancelled => None,
        }
    }

    /// Whether the underlying channel is gone, as opposed to a single failed call
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Transport { .. })
    }

    /// JSON-RPC error object to report this failure to a peer
    ///
    /// Errors that came from the remote side keep their original code, message
    /// and data.
    pub fn to_rpc_error(&self) -> McpRpcError {
        match self {
            Self::Server {
                code,
                message,
                data,
                ..
            } => McpRpcError {
                code: *code,
                message: message.clone(),
                data: data.clone(),
            },
            Self::InvalidRequest { message, .. } => {
                McpRpcError::new(codes::INVALID_PARAMS, message.clone())
            }
            Self::InvalidMessage { message, .. } => McpRpcError::invalid_request(message),
            other => McpRpcError::internal_error(other),
        }
    }
}

impl From<McpRpcError> for McpError {
    fn from(err: McpRpcError) -> Self {
        Self::Server {
            code: err.code,
            message: err.message,
            data: err.data,
            context: None,
        }
    }
}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<std::io::Error> for McpError {
    fn from(err: std::io::Error) -> Self {
        Self::transport(err.to_string())
    }
}

impl From<reqwest::Error> for McpError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::transport(format!("HTTP request timed out: {}", err))
        } else if err.is_connect() {
            Self::connection(format!("HTTP connect failed: {}", err))
        } else {
            Self::transport(err.to_string())
        }
    }
}
