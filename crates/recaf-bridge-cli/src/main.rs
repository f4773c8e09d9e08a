//! Recaf MCP bridge
//!
//! Speaks MCP over stdio to a local client and forwards everything to a Recaf
//! MCP server over Streamable HTTP.
//!
//! # Installation
//!
//! ```bash
//! cargo install --path crates/recaf-bridge-cli
//! ```
//!
//! # Usage
//!
//! Point an MCP client's stdio server command at `recaf-mcp-bridge`. Recaf
//! must already be running with its MCP server enabled.

mod args;
mod logging;
mod runtime;
mod signal_handler;

use args::Cli;
use clap::Parser;
use recaf_bridge_core::{Bridge, BridgeError, StdioTransport};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    runtime::block_on(run(cli))?
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    logging::init(&cli.log_level, cli.log_format)?;

    let config = cli.to_config();
    config.validate()?;

    let cancel = CancellationToken::new();
    let signals = signal_handler::cancel_on_ctrl_c(cancel.clone());

    let bridge = Bridge::new(config);
    let outcome = bridge
        .run(Arc::new(StdioTransport::stdio()), cancel.clone())
        .await;

    cancel.cancel();
    let _ = signals.await;

    match outcome {
        Ok(()) | Err(BridgeError::Cancelled) => Ok(()),
        Err(e) => Err(anyhow::Error::new(e).context("Recaf MCP bridge failed")),
    }
}
