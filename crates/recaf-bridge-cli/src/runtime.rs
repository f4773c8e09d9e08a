//! Runtime ownership
//!
//! The stdin reader runs on a blocking thread that cannot be interrupted, so a
//! runtime dropped after Ctrl+C would wait for one more line of input. The
//! runtime is built here and shut down with a short grace period instead.

use std::future::Future;
use std::time::Duration;

/// Grace period for background work once the bridge has unwound
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

/// Drive `future` to completion on a fresh multi-threaded runtime
pub fn block_on<F: Future>(future: F) -> std::io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let output = runtime.block_on(future);
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    Ok(output)
}
