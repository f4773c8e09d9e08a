//! CLI argument definitions using clap

use crate::logging::LogFormat;
use clap::Parser;
use recaf_bridge_core::config::{
    BridgeConfig, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_HOST, DEFAULT_PORT, METADATA_CACHE_TTL,
};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "recaf-mcp-bridge")]
#[command(about = "Expose a Recaf MCP server (Streamable HTTP) to stdio MCP clients")]
#[command(
    long_about = r#"Expose a Recaf MCP server (Streamable HTTP) to stdio MCP clients

Reads JSON-RPC from stdin and writes responses to stdout, one message per
line. Diagnostics go to stderr.

EXAMPLES:
  recaf-mcp-bridge                        # http://localhost:8085/mcp
  recaf-mcp-bridge --host 10.0.0.5 --port 9000
  RUST_LOG=debug recaf-mcp-bridge         # verbose diagnostics"#
)]
#[command(version)]
pub struct Cli {
    /// Host the Recaf MCP server listens on
    #[arg(long, env = "RECAF_MCP_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port the Recaf MCP server listens on
    #[arg(long, env = "RECAF_MCP_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Seconds allowed for connecting and the initialize handshake
    #[arg(
        long,
        env = "RECAF_MCP_CONNECT_TIMEOUT",
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS
    )]
    pub connect_timeout_secs: u64,

    /// Seconds a tools or resources listing is served from cache
    #[arg(long, env = "RECAF_MCP_CACHE_TTL", default_value_t = METADATA_CACHE_TTL.as_secs())]
    pub cache_ttl_secs: u64,

    /// Log level when RUST_LOG is not set (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Format of diagnostic lines on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,
}

impl Cli {
    /// Bridge configuration described by these arguments
    pub fn to_config(&self) -> BridgeConfig {
        BridgeConfig::new()
            .with_host(self.host.clone())
            .with_port(self.port)
            .with_connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .with_cache_ttl(Duration::from_secs(self.cache_ttl_secs))
    }
}
