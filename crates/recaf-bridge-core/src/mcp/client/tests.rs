//! Client tests against a scripted in-memory server

use super::*;
use crate::mcp::protocol::McpRpcError;
use async_trait::async_trait;
use std::sync::atomic::AtomicUsize;
use tokio::sync::{Mutex as AsyncMutex, mpsc};

type Responder = dyn Fn(&McpRequest) -> Option<McpResponse> + Send + Sync;

/// Transport whose peer answers each request with `responder`
pub(crate) struct ScriptedTransport {
    responder: Box<Responder>,
    inbound_tx: parking_lot::Mutex<Option<mpsc::UnboundedSender<McpMessage>>>,
    inbound_rx: AsyncMutex<mpsc::UnboundedReceiver<McpMessage>>,
    pub(crate) sent: parking_lot::Mutex<Vec<McpMessage>>,
    connected: AtomicBool,
}

impl ScriptedTransport {
    pub(crate) fn new(
        responder: impl Fn(&McpRequest) -> Option<McpResponse> + Send + Sync + 'static,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            responder: Box::new(responder),
            inbound_tx: parking_lot::Mutex::new(Some(tx)),
            inbound_rx: AsyncMutex::new(rx),
            sent: parking_lot::Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
        })
    }

    /// Push an unsolicited message from the server
    pub(crate) fn inject(&self, message: impl Into<McpMessage>) {
        if let Some(tx) = self.inbound_tx.lock().as_ref() {
            let _ = tx.send(message.into());
        }
    }

    /// Simulate the server going away
    pub(crate) fn hang_up(&self) {
        self.inbound_tx.lock().take();
    }

    pub(crate) fn sent_methods(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|m| match m {
                McpMessage::Request(r) => Some(r.method.clone()),
                McpMessage::Notification(n) => Some(n.method.clone()),
                McpMessage::Response(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl McpTransport for ScriptedTransport {
    async fn send(&self, message: McpMessage) -> Result<(), McpError> {
        if !self.is_connected() {
            return Err(McpError::connection("Connection closed"));
        }
        if let McpMessage::Request(request) = &message {
            if let Some(response) = (self.responder)(request) {
                self.inject(response);
            }
        }
        self.sent.lock().push(message);
        Ok(())
    }

    async fn receive(&self) -> Result<McpMessage, McpError> {
        self.inbound_rx
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| McpError::connection("Connection closed"))
    }

    async fn close(&self) -> Result<(), McpError> {
        self.connected.store(false, Ordering::SeqCst);
        self.hang_up();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Responder for a well-behaved Recaf-like server
pub(crate) fn recaf_server(request: &McpRequest) -> Option<McpResponse> {
    let result = match request.method.as_str() {
        methods::INITIALIZE => json!({
            "protocolVersion": "2025-03-26",
            "capabilities": { "tools": {}, "resources": {} },
            "serverInfo": { "name": "recaf", "version": "4.0.0" }
        }),
        methods::TOOLS_LIST => json!({
            "tools": [{ "name": "decompile-class", "inputSchema": { "type": "object" } }]
        }),
        methods::RESOURCES_LIST => json!({
            "resources": [{ "uri": "recaf://workspace", "name": "workspace" }]
        }),
        methods::RESOURCES_READ => json!({
            "contents": [{ "uri": "recaf://workspace", "text": "{}" }]
        }),
        methods::TOOLS_CALL => json!({
            "content": [{ "type": "text", "text": "class A {}" }],
            "isError": false
        }),
        methods::PING => json!({}),
        other => {
            return Some(McpResponse::error(
                request.id.clone(),
                McpRpcError::method_not_found(other),
            ));
        }
    };
    Some(McpResponse::success(request.id.clone(), result))
}

async fn initialized_client(transport: Arc<ScriptedTransport>) -> McpClient {
    let client = McpClient::new(transport);
    client.initialize().await.unwrap();
    client
}

#[tokio::test]
async fn test_initialize_records_server_info() {
    let transport = ScriptedTransport::new(recaf_server);
    let client = initialized_client(transport.clone()).await;

    assert!(client.is_initialized());
    assert_eq!(client.server_info().unwrap().name, "recaf");
    assert!(client.capabilities().tools.is_some());
    assert_eq!(
        transport.sent_methods(),
        vec![methods::INITIALIZE, methods::INITIALIZED]
    );

    let err = client.initialize().await.unwrap_err();
    assert!(matches!(err, McpError::AlreadyInitialized));
}

#[tokio::test]
async fn test_operations_require_initialize() {
    let client = McpClient::new(ScriptedTransport::new(recaf_server));
    let err = client.list_tools().await.unwrap_err();
    assert!(matches!(err, McpError::NotInitialized));
}

#[tokio::test]
async fn test_list_tools_follows_cursor() {
    let transport = ScriptedTransport::new(|request| {
        let result = match request.method.as_str() {
            methods::TOOLS_LIST => {
                let cursor = request
                    .params
                    .as_ref()
                    .and_then(|p| p.get("cursor"))
                    .and_then(Value::as_str);
                match cursor {
                    None => json!({ "tools": [{ "name": "a" }], "nextCursor": "p2" }),
                    Some("p2") => json!({ "tools": [{ "name": "b" }] }),
                    Some(_) => json!({ "tools": [] }),
                }
            }
            _ => return recaf_server(request),
        };
        Some(McpResponse::success(request.id.clone(), result))
    });
    let client = initialized_client(transport).await;

    let names: Vec<String> = client
        .list_tools()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[tokio::test]
async fn test_list_resources_stops_on_repeated_cursor() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let transport = ScriptedTransport::new(move |request| {
        if request.method != methods::RESOURCES_LIST {
            return recaf_server(request);
        }
        counter.fetch_add(1, Ordering::SeqCst);
        Some(McpResponse::success(
            request.id.clone(),
            json!({ "resources": [{ "uri": "u", "name": "n" }], "nextCursor": "same" }),
        ))
    });
    let client = initialized_client(transport).await;

    let resources = client.list_resources().await.unwrap();
    assert_eq!(resources.len(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_server_error_keeps_code() {
    let transport = ScriptedTransport::new(|request| {
        if request.method == methods::RESOURCES_READ {
            return Some(McpResponse::error(
                request.id.clone(),
                McpRpcError::new(-32002, "Resource not found"),
            ));
        }
        recaf_server(request)
    });
    let client = initialized_client(transport).await;

    let err = client.read_resource("recaf://nope").await.unwrap_err();
    assert_eq!(err.to_rpc_error().code, -32002);
}

#[tokio::test]
async fn test_call_tool_and_read_resource() {
    let client = initialized_client(ScriptedTransport::new(recaf_server)).await;

    let result = client
        .call_tool("decompile-class", json!({ "name": "A" }))
        .await
        .unwrap();
    assert!(!result.is_error);
    assert_eq!(result.content[0]["text"], "class A {}");

    let contents = client.read_resource("recaf://workspace").await.unwrap();
    assert_eq!(contents[0].text.as_deref(), Some("{}"));
    client.ping().await.unwrap();
}

#[tokio::test]
async fn test_answers_server_ping() {
    let transport = ScriptedTransport::new(recaf_server);
    let _client = initialized_client(transport.clone()).await;

    transport.inject(McpRequest::new("srv-1", methods::PING));
    transport.inject(McpRequest::new("srv-2", "sampling/createMessage"));

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let responses: Vec<McpResponse> = transport
                .sent
                .lock()
                .iter()
                .filter_map(|m| match m {
                    McpMessage::Response(r) => Some(r.clone()),
                    _ => None,
                })
                .collect();
            if responses.len() == 2 {
                assert!(responses[0].is_success());
                assert_eq!(
                    responses[1].error.as_ref().map(|e| e.code),
                    Some(crate::mcp::protocol::codes::METHOD_NOT_FOUND)
                );
                break;
            }
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
}

struct Recording(parking_lot::Mutex<Vec<String>>);

impl NotificationHandler for Recording {
    fn handle(&self, method: &str, _params: Option<Value>) {
        self.0.lock().push(method.to_string());
    }
}

#[tokio::test]
async fn test_notifications_reach_handler() {
    let transport = ScriptedTransport::new(recaf_server);
    let handler = Arc::new(Recording(parking_lot::Mutex::new(Vec::new())));
    let client = McpClient::with_notification_handler(transport.clone(), handler.clone());
    client.initialize().await.unwrap();

    transport.inject(McpNotification::new(methods::TOOLS_LIST_CHANGED));
    // A round trip after the injection guarantees the receiver has seen it
    client.ping().await.unwrap();

    assert_eq!(
        handler.0.lock().as_slice(),
        &[methods::TOOLS_LIST_CHANGED.to_string()]
    );
}

#[tokio::test]
async fn test_disconnect_fails_pending_request() {
    let transport = ScriptedTransport::new(|request| {
        if request.method == methods::TOOLS_LIST {
            return None;
        }
        recaf_server(request)
    });
    let client = initialized_client(transport.clone()).await;

    let call = client.list_tools();
    let hang_up = async {
        tokio::task::yield_now().await;
        transport.hang_up();
    };
    let (result, ()) = tokio::join!(call, hang_up);

    assert!(result.unwrap_err().is_disconnect());
}

#[tokio::test(start_paused = true)]
async fn test_request_timeout() {
    let transport = ScriptedTransport::new(|request| {
        if request.method == methods::PING {
            return None;
        }
        recaf_server(request)
    });
    let client = McpClient::new(transport).with_request_timeout(Duration::from_secs(2));
    client.initialize().await.unwrap();

    let err = client.ping().await.unwrap_err();
    assert!(matches!(err, McpError::Timeout { millis: 2000, .. }));
    assert!(client.pending.is_empty());
}

#[tokio::test]
async fn test_close_stops_client() {
    let transport = ScriptedTransport::new(recaf_server);
    let client = initialized_client(transport.clone()).await;

    client.close().await.unwrap();
    assert!(!client.is_connected());
    assert!(!client.is_initialized());
    assert!(client.ping().await.is_err());
}
