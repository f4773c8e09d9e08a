//! HTTP transport for MCP
//!
//! Client side of the Streamable HTTP transport: every outgoing message is a
//! POST to a single endpoint, and the server answers either with a JSON body
//! or with a Server-Sent Events stream carrying one or more messages. A
//! standalone GET stream can carry server-initiated messages.

use super::McpTransport;
use crate::mcp::error::McpError;
use crate::mcp::protocol::McpMessage;
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Header carrying the server-assigned session id
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

/// Capacity of the inbound message channel
const INBOUND_CHANNEL_CAPACITY: usize = 100;

/// HTTP transport configuration
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Full endpoint URL, e.g. `http://localhost:8085/mcp`
    pub endpoint: String,
    /// HTTP headers to include in requests
    pub headers: HashMap<String, String>,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Open a standalone GET event stream once a session exists
    pub enable_sse: bool,
}

impl HttpTransportConfig {
    /// Create a new HTTP transport config
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            headers: HashMap::new(),
            connect_timeout: Duration::from_secs(300),
            enable_sse: true,
        }
    }

    /// Add a header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enable/disable the standalone event stream
    pub fn with_sse(mut self, enabled: bool) -> Self {
        self.enable_sse = enabled;
        self
    }
}

/// HTTP transport for MCP
pub struct HttpTransport {
    /// HTTP client
    client: Client,
    /// Endpoint URL
    endpoint: String,
    /// Session id assigned by the server on initialize
    session_id: RwLock<Option<String>>,
    /// Whether the standalone event stream should be opened
    enable_sse: bool,
    /// Whether connected
    connected: AtomicBool,
    /// Inbound messages from POST bodies and event streams
    inbound_tx: mpsc::Sender<McpMessage>,
    inbound_rx: tokio::sync::Mutex<mpsc::Receiver<McpMessage>>,
    /// Background SSE readers
    tasks: Mutex<Vec<JoinHandle<()>>>,
    /// Stops background readers and pending receives
    shutdown: CancellationToken,
}

impl HttpTransport {
    /// Create a new HTTP transport
    pub fn new(config: HttpTransportConfig) -> Result<Self, McpError> {
        let mut header_map = HeaderMap::new();
        header_map.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/event-stream"),
        );

        for (key, value) in &config.headers {
            if let (Ok(name), Ok(val)) = (
                HeaderName::try_from(key.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                header_map.insert(name, val);
            } else {
                warn!("Ignoring invalid HTTP header '{}'", key);
            }
        }

        // No overall request timeout: event streams stay open for the whole session.
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .default_headers(header_map)
            .build()
            .map_err(|e| McpError::connection(format!("Failed to create HTTP client: {}", e)))?;

        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);

        Ok(Self {
            client,
            endpoint: config.endpoint,
            session_id: RwLock::new(None),
            enable_sse: config.enable_sse,
            connected: AtomicBool::new(true),
            inbound_tx,
            inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            tasks: Mutex::new(Vec::new()),
            shutdown: CancellationToken::new(),
        })
    }

    /// Endpoint URL this transport talks to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Session id assigned by the server, if any
    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    /// Open the standalone GET event stream for server-initiated messages
    ///
    /// Best effort: servers that do not offer one answer 405 and the transport
    /// keeps working over POST responses alone.
    pub fn start_event_stream(&self) {
        if !self.enable_sse {
            return;
        }

        let mut request = self
            .client
            .get(&self.endpoint)
            .header(ACCEPT, "text/event-stream");
        if let Some(id) = self.session_id() {
            request = request.header(SESSION_ID_HEADER, id);
        }

        let inbound_tx = self.inbound_tx.clone();
        let shutdown = self.shutdown.clone();

        let handle = tokio::spawn(async move {
            let response = tokio::select! {
                _ = shutdown.cancelled() => return,
                response = request.send() => response,
            };

            match response {
                Ok(response) if response.status() == StatusCode::METHOD_NOT_ALLOWED => {
                    debug!("Server does not offer a standalone event stream");
                }
                Ok(response) if response.status().is_success() => {
                    read_event_stream(response, inbound_tx, shutdown).await;
                }
                Ok(response) => {
                    warn!("Event stream request failed with status {}", response.status());
                }
                Err(e) => {
                    warn!("Event stream request failed: {}", e);
                }
            }
        });

        self.tasks.lock().push(handle);
    }

    fn capture_session_id(&self, response: &Response) {
        if let Some(id) = response
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            let mut session = self.session_id.write();
            if session.as_deref() != Some(id) {
                debug!("MCP session id: {}", id);
                *session = Some(id.to_string());
            }
        }
    }

    async fn deliver(&self, message: McpMessage) -> Result<(), McpError> {
        self.inbound_tx
            .send(message)
            .await
            .map_err(|_| McpError::connection("Inbound channel closed"))
    }

    fn abort_tasks(&self) {
        for handle in self.tasks.lock().drain(..) {
            handle.abort();
        }
    }
}

#[async_trait]
impl McpTransport for HttpTransport {
    async fn send(&self, message: McpMessage) -> Result<(), McpError> {
        if !self.is_connected() {
            return Err(McpError::connection("Not connected"));
        }

        let json = serde_json::to_string(&message)?;
        debug!("Sending HTTP message: {}", json);

        let session = self.session_id();
        let mut request = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(json);
        if let Some(id) = &session {
            request = request.header(SESSION_ID_HEADER, id.as_str());
        }

        let response = request.send().await?;
        self.capture_session_id(&response);

        let status = response.status();
        if status == StatusCode::ACCEPTED || status == StatusCode::NO_CONTENT {
            return Ok(());
        }
        if status == StatusCode::NOT_FOUND && session.is_some() {
            self.connected.store(false, Ordering::SeqCst);
            return Err(McpError::connection("MCP session expired"));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::transport(format!("HTTP error {}: {}", status, body)));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("text/event-stream") {
            let inbound_tx = self.inbound_tx.clone();
            let shutdown = self.shutdown.clone();
            let handle = tokio::spawn(read_event_stream(response, inbound_tx, shutdown));
            let mut tasks = self.tasks.lock();
            tasks.retain(|task| !task.is_finished());
            tasks.push(handle);
            return Ok(());
        }

        let body = response.bytes().await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }

        for message in decode_json_body(&body)? {
            self.deliver(message).await?;
        }
        Ok(())
    }

    async fn receive(&self) -> Result<McpMessage, McpError> {
        let mut rx = self.inbound_rx.lock().await;
        tokio::select! {
            _ = self.shutdown.cancelled() => Err(McpError::connection("Transport closed")),
            message = rx.recv() => message.ok_or_else(|| McpError::connection("Channel closed")),
        }
    }

    async fn close(&self) -> Result<(), McpError> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        self.shutdown.cancel();
        self.abort_tasks();

        let session = self.session_id.write().take();
        if let Some(id) = session {
            match self
                .client
                .delete(&self.endpoint)
                .header(SESSION_ID_HEADER, id)
                .send()
                .await
            {
                Ok(response) if response.status() == StatusCode::METHOD_NOT_ALLOWED => {
                    debug!("Server does not support explicit session termination");
                }
                Ok(_) => {}
                Err(e) => debug!("Session termination request failed: {}", e),
            }
        }

        debug!("HTTP transport closed");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.shutdown.is_cancelled()
    }
}

impl Drop for HttpTransport {
    fn drop(&mut self) {
        self.connected.store(false, Ordering::SeqCst);
        self.shutdown.cancel();
        self.abort_tasks();
    }
}

/// Decode a JSON response body: one message or a batch
fn decode_json_body(body: &[u8]) -> Result<Vec<McpMessage>, McpError> {
    match serde_json::from_slice::<Value>(body)? {
        Value::Array(items) => items
            .into_iter()
            .map(|item| McpMessage::from_value(item).map_err(McpError::from))
            .collect(),
        value => Ok(vec![McpMessage::from_value(value)?]),
    }
}

/// Pump an SSE body into the inbound channel until it ends
async fn read_event_stream(
    response: Response,
    inbound_tx: mpsc::Sender<McpMessage>,
    shutdown: CancellationToken,
) {
    let mut stream = response.bytes_stream();
    let mut decoder = SseDecoder::default();

    loop {
        let chunk = tokio::select! {
            _ = shutdown.cancelled() => break,
            chunk = stream.next() => chunk,
        };

        match chunk {
            Some(Ok(bytes)) => {
                for data in decoder.push(&bytes) {
                    let Some(message) = parse_sse_data(&data) else {
                        continue;
                    };
                    if inbound_tx.send(message).await.is_err() {
                        warn!("Failed to forward SSE message: receiver dropped");
                        return;
                    }
                }
            }
            Some(Err(e)) => {
                error!("SSE stream error: {}", e);
                break;
            }
            None => {
                debug!("SSE stream ended");
                break;
            }
        }
    }
}

/// Incremental Server-Sent Events decoder
///
/// Buffers raw bytes so multi-byte characters and events split across chunks
/// are reassembled. Yields the concatenated `data:` payload of each event.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feed a chunk, returning the data payloads of all completed events
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let raw: Vec<u8> = self.buffer.drain(..end + 2).collect();
            let text = String::from_utf8_lossy(&raw[..end]);
            if let Some(data) = event_data(&text) {
                events.push(data);
            }
        }
        events
    }
}

/// Collect the `data:` lines of one event
fn event_data(event: &str) -> Option<String> {
    let lines: Vec<&str> = event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.strip_prefix(' ').unwrap_or(value))
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

/// Parse one SSE data payload as an MCP message
fn parse_sse_data(data: &str) -> Option<McpMessage> {
    if data.trim().is_empty() {
        return None;
    }

    match serde_json::from_str::<McpMessage>(data) {
        Ok(message) => Some(message),
        Err(e) => {
            warn!("Failed to parse SSE message: {} - data: {}", e, data);
            None
        }
    }
}
