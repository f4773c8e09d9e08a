//! Standard I/O transport for MCP
//!
//! Newline-delimited JSON over an async reader/writer pair. In production the
//! pair is the process's stdin/stdout; tests plug in in-memory pipes.

use super::McpTransport;
use crate::mcp::error::McpError;
use crate::mcp::protocol::{McpMessage, RequestId};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::Mutex;
use tracing::trace;

/// Stdio transport for MCP communication
pub struct StdioTransport<R = Stdin, W = Stdout> {
    /// Line reader
    reader: Mutex<BufReader<R>>,
    /// Writer, one message per line
    writer: Mutex<W>,
    /// Write side open; cleared by `close` or a failed write
    connected: AtomicBool,
    /// Read side reached end of input
    eof: AtomicBool,
}

impl StdioTransport<Stdin, Stdout> {
    /// Transport over this process's stdin and stdout
    pub fn stdio() -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl<R, W> StdioTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Create a transport over an arbitrary reader/writer pair
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Mutex::new(BufReader::new(reader)),
            writer: Mutex::new(writer),
            connected: AtomicBool::new(true),
            eof: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl<R, W> McpTransport for StdioTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&self, message: McpMessage) -> Result<(), McpError> {
        if !self.is_connected() {
            return Err(McpError::connection("Connection closed"));
        }

        let mut json = serde_json::to_string(&message)?;
        json.push('\n');
        trace!("stdio -> {}", json.trim_end());

        let mut writer = self.writer.lock().await;
        let written = match writer.write_all(json.as_bytes()).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            self.connected.store(false, Ordering::SeqCst);
            return Err(e.into());
        }

        Ok(())
    }

    async fn receive(&self) -> Result<McpMessage, McpError> {
        if self.eof.load(Ordering::SeqCst) {
            return Err(McpError::connection("End of input"));
        }
        let mut reader = self.reader.lock().await;
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;

            // Only the read side is done; replies can still be written
            if bytes_read == 0 {
                self.eof.store(true, Ordering::SeqCst);
                return Err(McpError::connection("End of input"));
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            trace!("stdio <- {}", trimmed);
            let value: Value = serde_json::from_str(trimmed)?;
            return McpMessage::from_value(value.clone()).map_err(|e| {
                let id = value
                    .get("id")
                    .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok());
                McpError::invalid_message(e.to_string(), id)
            });
        }
    }

    async fn close(&self) -> Result<(), McpError> {
        if self.connected.swap(false, Ordering::SeqCst) {
            let mut writer = self.writer.lock().await;
            writer.flush().await?;
            writer.shutdown().await?;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
