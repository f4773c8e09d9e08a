//! MCP client implementation
//!
//! Provides a high-level client for communicating with MCP servers.
//!
//! # Features
//! - Concurrent request support with routing by request id
//! - Optional request timeout
//! - Notification handling
//! - Background message receiver

mod notification;
mod operations;
mod receiver;

pub use notification::{LoggingNotificationHandler, NotificationHandler};

use super::error::McpError;
use super::protocol::{McpMessage, McpNotification, McpRequest, McpResponse, RequestId, methods};
use super::transport::McpTransport;
use super::types::{
    ClientCapabilities, ClientInfo, InitializeParams, InitializeResult, McpCapabilities,
    McpServerInfo,
};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Requests waiting for a response, keyed by the string form of their id
pub(crate) type PendingRequests = DashMap<String, oneshot::Sender<McpResponse>>;

/// MCP client for communicating with MCP servers
pub struct McpClient {
    /// Transport layer
    transport: Arc<dyn McpTransport>,
    /// Server info
    server_info: RwLock<Option<McpServerInfo>>,
    /// Server capabilities
    capabilities: RwLock<McpCapabilities>,
    /// Request ID counter
    request_id: AtomicU64,
    /// Requests awaiting a response
    pending: Arc<PendingRequests>,
    /// Whether initialized
    initialized: AtomicBool,
    /// Stops the background receiver
    shutdown: CancellationToken,
    /// Request timeout, `None` waits as long as the transport allows
    request_timeout: Option<Duration>,
    /// Background message receiver task handle
    receiver_handle: Mutex<Option<JoinHandle<()>>>,
}

impl McpClient {
    /// Create a new MCP client with the given transport
    pub fn new(transport: Arc<dyn McpTransport>) -> Self {
        Self::with_notification_handler(transport, Arc::new(LoggingNotificationHandler))
    }

    /// Create a new MCP client that hands server notifications to `handler`
    pub fn with_notification_handler(
        transport: Arc<dyn McpTransport>,
        handler: Arc<dyn NotificationHandler>,
    ) -> Self {
        let pending = Arc::new(PendingRequests::new());
        let shutdown = CancellationToken::new();

        let receiver_handle = tokio::spawn(receiver::message_receiver(
            Arc::clone(&transport),
            Arc::clone(&pending),
            handler,
            shutdown.clone(),
        ));

        Self {
            transport,
            server_info: RwLock::new(None),
            capabilities: RwLock::new(McpCapabilities::default()),
            request_id: AtomicU64::new(1),
            pending,
            initialized: AtomicBool::new(false),
            shutdown,
            request_timeout: None,
            receiver_handle: Mutex::new(Some(receiver_handle)),
        }
    }

    /// Set request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Initialize the MCP connection
    #[instrument(skip(self), level = "debug")]
    pub async fn initialize(&self) -> Result<McpServerInfo, McpError> {
        if self.is_initialized() {
            return Err(McpError::AlreadyInitialized);
        }

        let params = InitializeParams {
            protocol_version: super::protocol::MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: ClientInfo::default(),
        };

        let result: InitializeResult = self
            .call(methods::INITIALIZE, Some(json!(params)))
            .await
            .map_err(|e| e.with_context("initialize"))?;

        *self.server_info.write() = Some(result.server_info.clone());
        *self.capabilities.write() = result.capabilities;

        self.notify(methods::INITIALIZED, None).await?;
        self.initialized.store(true, Ordering::SeqCst);

        Ok(result.server_info)
    }

    /// Check if the client is initialized
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Get server info
    pub fn server_info(&self) -> Option<McpServerInfo> {
        self.server_info.read().clone()
    }

    /// Get server capabilities
    pub fn capabilities(&self) -> McpCapabilities {
        self.capabilities.read().clone()
    }

    /// Close the client connection
    pub async fn close(&self) -> Result<(), McpError> {
        self.shutdown.cancel();
        self.initialized.store(false, Ordering::SeqCst);

        let result = self.transport.close().await;

        let handle = self.receiver_handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        // Anyone still waiting gets "channel closed"
        self.pending.clear();
        result
    }

    /// Make a request and wait for the response
    pub(crate) async fn call<T>(&self, method: &str, params: Option<Value>) -> Result<T, McpError>
    where
        T: serde::de::DeserializeOwned,
    {
        let id = self.next_request_id();
        let key = id.to_string();

        let request = McpRequest::new(id, method);
        let request = if let Some(p) = params {
            request.with_params(p)
        } else {
            request
        };

        // Register before sending: a JSON response is routed while `send` is still running.
        let (response_sender, response_receiver) = oneshot::channel();
        self.pending.insert(key.clone(), response_sender);

        if let Err(e) = self.transport.send(McpMessage::Request(request)).await {
            self.pending.remove(&key);
            return Err(e);
        }

        let response = match self.request_timeout {
            Some(limit) => match timeout(limit, response_receiver).await {
                Ok(received) => received,
                Err(_) => {
                    self.pending.remove(&key);
                    return Err(McpError::timeout(limit).with_context(method));
                }
            },
            None => response_receiver.await,
        }
        .map_err(|_| McpError::connection("Response channel closed"))?;

        match response.into_result() {
            Ok(value) => serde_json::from_value(value).map_err(McpError::from),
            Err(e) => Err(McpError::from(e)),
        }
    }

    /// Send a notification (no response expected)
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        let notification = McpNotification::new(method);
        let notification = if let Some(p) = params {
            notification.with_params(p)
        } else {
            notification
        };

        self.transport
            .send(McpMessage::Notification(notification))
            .await
    }

    /// Generate next request ID
    fn next_request_id(&self) -> RequestId {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        match i64::try_from(id) {
            Ok(n) => RequestId::Number(n),
            Err(_) => RequestId::String(format!("req-{}", id)),
        }
    }

    /// Ensure the client is initialized
    pub(crate) fn ensure_initialized(&self) -> Result<(), McpError> {
        if !self.is_initialized() {
            return Err(McpError::NotInitialized);
        }
        Ok(())
    }

    /// Check if the client is connected
    pub fn is_connected(&self) -> bool {
        !self.shutdown.is_cancelled() && self.transport.is_connected()
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.receiver_handle.lock().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests;
