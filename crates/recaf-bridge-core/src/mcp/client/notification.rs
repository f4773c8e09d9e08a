//! Notification handler traits and implementations

use serde_json::Value;
use tracing::debug;

/// Sync hook for server notifications, called from the client's receiver task.
///
/// Implementations must not block; hand work off if it needs to await.
pub trait NotificationHandler: Send + Sync {
    /// Handle a notification
    fn handle(&self, method: &str, params: Option<Value>);
}

/// Default notification handler that logs notifications
pub struct LoggingNotificationHandler;

impl NotificationHandler for LoggingNotificationHandler {
    fn handle(&self, method: &str, params: Option<Value>) {
        debug!("MCP notification: {} {:?}", method, params);
    }
}
