//! Forwarding front end
//!
//! Serves MCP to the local client and hands every request to the
//! [`SessionManager`]. Only the shape of requests and results is adapted here;
//! payloads pass through untouched.

use super::session::{ResourcePayload, SessionManager};
use crate::error::{BridgeError, BridgeResult};
use crate::mcp::protocol::{
    MCP_PROTOCOL_VERSION, McpMessage, McpRequest, McpResponse, McpRpcError, methods,
};
use crate::mcp::transport::McpTransport;
use crate::mcp::types::{
    InitializeResult, McpCapabilities, McpServerInfo, ResourceCapabilities, ToolCapabilities,
};
use crate::mcp::McpError;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Name the bridge announces to the local client
pub const BRIDGE_SERVER_NAME: &str = "recaf-mcp-bridge";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializeParams {
    protocol_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallToolParams {
    name: String,
    #[serde(default = "empty_arguments")]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct ReadResourceParams {
    uri: String,
}

fn empty_arguments() -> Value {
    Value::Object(Map::new())
}

/// Local MCP server loop
pub struct FrontEnd {
    transport: Arc<dyn McpTransport>,
    session: Arc<SessionManager>,
}

impl FrontEnd {
    /// Create a front end serving `session` over `transport`
    pub fn new(transport: Arc<dyn McpTransport>, session: Arc<SessionManager>) -> Self {
        Self { transport, session }
    }

    /// Serve until the client goes away or `cancel` fires.
    ///
    /// After end of input the requests still running are allowed to finish and
    /// answer; on cancellation they are aborted.
    pub async fn serve(&self, cancel: CancellationToken) -> BridgeResult<()> {
        let mut in_flight = JoinSet::new();

        let outcome = loop {
            while in_flight.try_join_next().is_some() {}

            let received = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Front end cancelled with {} request(s) in flight", in_flight.len());
                    in_flight.abort_all();
                    break Err(BridgeError::Cancelled);
                }
                received = self.transport.receive() => received,
            };

            match received {
                Ok(McpMessage::Request(request)) => {
                    let session = Arc::clone(&self.session);
                    let transport = Arc::clone(&self.transport);
                    in_flight.spawn(async move {
                        let response = handle_request(&session, request).await;
                        if let Err(e) = transport.send(McpMessage::Response(response)).await {
                            warn!("Failed to answer local client: {}", e);
                        }
                    });
                }
                Ok(McpMessage::Notification(notification)) => {
                    debug!("Ignoring client notification: {}", notification.method);
                }
                Ok(McpMessage::Response(response)) => {
                    debug!("Ignoring client response to {:?}", response.id);
                }
                Err(McpError::Serialization { message, .. }) => {
                    warn!("Unparseable message from local client: {}", message);
                    let response = McpResponse::orphan_error(McpRpcError::parse_error(message));
                    if let Err(e) = self.transport.send(McpMessage::Response(response)).await {
                        break Err(BridgeError::transport(e.to_string()));
                    }
                }
                Err(McpError::InvalidMessage { message, id, .. }) => {
                    warn!("Invalid message from local client: {}", message);
                    let error = McpRpcError::invalid_request(message);
                    let response = match id {
                        Some(id) => McpResponse::error(id, error),
                        None => McpResponse::orphan_error(error),
                    };
                    if let Err(e) = self.transport.send(McpMessage::Response(response)).await {
                        break Err(BridgeError::transport(e.to_string()));
                    }
                }
                Err(McpError::Connection { .. }) => {
                    debug!("Local client closed its stream");
                    break Ok(());
                }
                Err(e) => break Err(BridgeError::transport(e.to_string())),
            }
        };

        if outcome.is_ok() {
            tokio::select! {
                _ = cancel.cancelled() => in_flight.abort_all(),
                _ = drain(&mut in_flight) => {}
            }
        }

        outcome
    }
}

async fn drain(in_flight: &mut JoinSet<()>) {
    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            if e.is_panic() {
                warn!("Request handler panicked");
            }
        }
    }
}

/// Answer one request from the local client
pub async fn handle_request(session: &SessionManager, request: McpRequest) -> McpResponse {
    let id = request.id.clone();
    match dispatch(session, request).await {
        Ok(result) => McpResponse::success(id, result),
        Err(error) => {
            debug!("Request {} failed: {}", id, error);
            McpResponse::error(id, error)
        }
    }
}

async fn dispatch(session: &SessionManager, request: McpRequest) -> Result<Value, McpRpcError> {
    match request.method.as_str() {
        methods::INITIALIZE => {
            let params: Option<InitializeParams> = request
                .params
                .map(serde_json::from_value)
                .transpose()
                .map_err(McpRpcError::invalid_params)?;
            let protocol_version = params
                .and_then(|p| p.protocol_version)
                .unwrap_or_else(|| MCP_PROTOCOL_VERSION.to_string());
            to_result(&initialize_result(protocol_version))
        }
        methods::PING => Ok(json!({})),
        methods::TOOLS_LIST => {
            let tools = session.list_tools().await?;
            Ok(json!({ "tools": tools }))
        }
        methods::TOOLS_CALL => {
            let params: CallToolParams = parse_params(request.params)?;
            let result = session.call_tool(&params.name, params.arguments).await?;
            to_result(&result)
        }
        methods::RESOURCES_LIST => {
            let resources = session.list_resources().await?;
            Ok(json!({ "resources": resources }))
        }
        methods::RESOURCES_READ => {
            let params: ReadResourceParams = parse_params(request.params)?;
            let payload = session.read_resource(&params.uri).await?;
            Ok(read_result(&params.uri, payload))
        }
        other => Err(McpRpcError::method_not_found(other)),
    }
}

fn initialize_result(protocol_version: String) -> InitializeResult {
    InitializeResult {
        protocol_version,
        capabilities: McpCapabilities {
            tools: Some(ToolCapabilities::default()),
            resources: Some(ResourceCapabilities::default()),
        },
        server_info: McpServerInfo::new(BRIDGE_SERVER_NAME, env!("CARGO_PKG_VERSION")),
    }
}

fn read_result(uri: &str, payload: ResourcePayload) -> Value {
    let mime_type = payload.mime_type();
    let item = match payload {
        ResourcePayload::Text(text) => json!({ "uri": uri, "mimeType": mime_type, "text": text }),
        ResourcePayload::Blob(blob) => json!({ "uri": uri, "mimeType": mime_type, "blob": blob }),
    };
    json!({ "contents": [item] })
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, McpRpcError> {
    let params = params.ok_or_else(|| McpRpcError::invalid_params("missing params"))?;
    serde_json::from_value(params).map_err(McpRpcError::invalid_params)
}

fn to_result<T: serde::Serialize>(value: &T) -> Result<Value, McpRpcError> {
    serde_json::to_value(value).map_err(McpRpcError::internal_error)
}
