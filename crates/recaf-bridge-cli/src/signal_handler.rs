//! Ctrl+C handling
//!
//! The first interrupt cancels the bridge run so it can unwind and release the
//! backend; the process then exits normally.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cancel `token` when the process receives Ctrl+C
pub fn cancel_on_ctrl_c(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => {
                    info!("Interrupted, shutting down");
                    token.cancel();
                }
                Err(e) => warn!("Unable to listen for Ctrl+C: {}", e),
            },
        }
    })
}
