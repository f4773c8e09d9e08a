//! Opening backend sessions

use super::backend::{Backend, BackendHandle};
use crate::mcp::client::{McpClient, NotificationHandler};
use crate::mcp::transport::{HttpTransport, HttpTransportConfig};
use crate::mcp::types::{McpResource, McpResourceContent, McpServerInfo, McpTool, McpToolResult};
use crate::mcp::McpError;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Opens a not-yet-initialized backend session
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a transport to `endpoint`; server notifications go to `notifications`
    async fn open(
        &self,
        endpoint: &str,
        notifications: Arc<dyn NotificationHandler>,
    ) -> Result<BackendHandle, McpError>;
}

/// Connector for MCP Streamable HTTP
#[derive(Debug, Clone)]
pub struct HttpConnector {
    connect_timeout: Duration,
}

impl HttpConnector {
    /// Create a connector whose TCP connect is bounded by `connect_timeout`
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn open(
        &self,
        endpoint: &str,
        notifications: Arc<dyn NotificationHandler>,
    ) -> Result<BackendHandle, McpError> {
        let config =
            HttpTransportConfig::new(endpoint).with_connect_timeout(self.connect_timeout);
        let transport = Arc::new(HttpTransport::new(config)?);
        let client = McpClient::with_notification_handler(transport.clone(), notifications);
        debug!("Opened HTTP transport to {}", endpoint);

        Ok(Arc::new(HttpBackend { client, transport }))
    }
}

/// [`Backend`] over an [`McpClient`] on Streamable HTTP
pub struct HttpBackend {
    client: McpClient,
    transport: Arc<HttpTransport>,
}

#[async_trait]
impl Backend for HttpBackend {
    async fn initialize(&self) -> Result<McpServerInfo, McpError> {
        let info = self.client.initialize().await?;
        // Server-initiated messages can only flow once a session id exists
        self.transport.start_event_stream();
        Ok(info)
    }

    async fn list_tools(&self) -> Result<Vec<McpTool>, McpError> {
        self.client.list_tools().await
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpToolResult, McpError> {
        self.client.call_tool(name, arguments).await
    }

    async fn list_resources(&self) -> Result<Vec<McpResource>, McpError> {
        self.client.list_resources().await
    }

    async fn read_resource(&self, uri: &str) -> Result<Vec<McpResourceContent>, McpError> {
        self.client.read_resource(uri).await
    }

    async fn close(&self) -> Result<(), McpError> {
        self.client.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::client::LoggingNotificationHandler;

    #[tokio::test]
    async fn test_open_does_not_touch_the_network() {
        let connector = HttpConnector::new(Duration::from_secs(1));
        let backend = connector
            .open("http://127.0.0.1:9/mcp", Arc::new(LoggingNotificationHandler))
            .await
            .unwrap();

        // Nothing was sent yet, so nothing failed yet
        backend.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_backend_fails_initialize() {
        let connector = HttpConnector::new(Duration::from_secs(1));
        let backend = connector
            .open("http://127.0.0.1:9/mcp", Arc::new(LoggingNotificationHandler))
            .await
            .unwrap();

        let err = backend.initialize().await.unwrap_err();
        assert!(err.is_disconnect());
        assert_eq!(err.context(), Some("initialize"));
    }
}
