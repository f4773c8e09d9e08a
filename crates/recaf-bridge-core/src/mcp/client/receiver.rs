//! Background message receiver for MCP client

use super::super::error::McpError;
use super::super::protocol::{McpMessage, McpRequest, McpResponse, McpRpcError, methods};
use super::super::transport::McpTransport;
use super::{NotificationHandler, PendingRequests};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Background task that receives messages and routes them
pub(super) async fn message_receiver(
    transport: Arc<dyn McpTransport>,
    pending: Arc<PendingRequests>,
    handler: Arc<dyn NotificationHandler>,
    shutdown: CancellationToken,
) {
    loop {
        let result = tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("MCP message receiver shutting down");
                break;
            }
            result = transport.receive() => result,
        };

        match result {
            Ok(McpMessage::Response(response)) => route_response(&pending, response),
            Ok(McpMessage::Notification(notification)) => {
                debug!("Received notification: {}", notification.method);
                handler.handle(&notification.method, notification.params);
            }
            Ok(McpMessage::Request(request)) => {
                answer_server_request(transport.as_ref(), request).await;
            }
            Err(e) if e.is_disconnect() => {
                if !shutdown.is_cancelled() {
                    error!("MCP connection lost: {}", e);
                }
                fail_pending(&pending, &e);
                break;
            }
            Err(e) => warn!("Dropping unreadable MCP message: {}", e),
        }
    }
}

fn route_response(pending: &PendingRequests, response: McpResponse) {
    let Some(id) = response.id.as_ref().map(ToString::to_string) else {
        warn!("Received response without id: {:?}", response.error);
        return;
    };

    match pending.remove(&id) {
        Some((_, sender)) => {
            if sender.send(response).is_err() {
                debug!("Request {} was abandoned before its response arrived", id);
            }
        }
        None => warn!("Received response for unknown request: {}", id),
    }
}

/// The bridge offers no client-side features, so only `ping` gets a real answer.
async fn answer_server_request(transport: &dyn McpTransport, request: McpRequest) {
    let response = if request.method == methods::PING {
        McpResponse::success(request.id, json!({}))
    } else {
        warn!("Rejecting server request: {}", request.method);
        McpResponse::error(request.id, McpRpcError::method_not_found(&request.method))
    };

    if let Err(e) = transport.send(McpMessage::Response(response)).await {
        warn!("Failed to answer server request: {}", e);
    }
}

/// Dropping the senders wakes every waiter with a connection error.
fn fail_pending(pending: &PendingRequests, cause: &McpError) {
    if !pending.is_empty() {
        warn!(
            "Cancelling {} pending request(s) due to connection error: {}",
            pending.len(),
            cause
        );
    }
    pending.clear();
}
