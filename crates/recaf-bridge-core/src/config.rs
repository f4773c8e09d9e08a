//! Bridge configuration
//!
//! Defaults mirror what the Recaf MCP server listens on out of the box.

use crate::error::{BridgeError, BridgeResult};
use std::time::Duration;

/// Host the backend is reached on by default
pub const DEFAULT_HOST: &str = "localhost";

/// Port the backend listens on by default
pub const DEFAULT_PORT: u16 = 8085;

/// Path of the Streamable HTTP endpoint on the backend
pub const MCP_PATH: &str = "/mcp";

/// Upper bound for opening the transport plus the initialize handshake (5 minutes)
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 300;

/// How long closing a released backend session may take
pub const BACKEND_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifetime of a cached tools or resources listing
pub const METADATA_CACHE_TTL: Duration = Duration::from_secs(30);

/// Configuration for one bridge run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Backend host
    pub host: String,
    /// Backend port
    pub port: u16,
    /// Bound on the connect phase
    pub connect_timeout: Duration,
    /// Metadata cache TTL, shared by both listings
    pub cache_ttl: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            cache_ttl: METADATA_CACHE_TTL,
        }
    }
}

impl BridgeConfig {
    /// Create a config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backend host
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the backend port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the connect-phase timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the metadata cache TTL
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// URL of the backend's MCP endpoint
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, MCP_PATH)
    }

    /// Reject settings the bridge cannot run with
    pub fn validate(&self) -> BridgeResult<()> {
        if self.host.trim().is_empty() {
            return Err(BridgeError::config("host must not be empty"));
        }
        if self.port == 0 {
            return Err(BridgeError::config("port must be between 1 and 65535"));
        }
        if self.cache_ttl.is_zero() {
            return Err(BridgeError::config("cache TTL must be greater than zero"));
        }
        if self.connect_timeout.is_zero() {
            return Err(BridgeError::config(
                "connect timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.endpoint(), "http://localhost:8085/mcp");
        assert_eq!(config.connect_timeout, Duration::from_secs(300));
        assert_eq!(config.cache_ttl, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = BridgeConfig::new()
            .with_host("10.0.0.5")
            .with_port(9000)
            .with_cache_ttl(Duration::from_secs(5));
        assert_eq!(config.endpoint(), "http://10.0.0.5:9000/mcp");
        assert_eq!(config.cache_ttl, Duration::from_secs(5));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(BridgeConfig::new().with_port(0).validate().is_err());
        assert!(BridgeConfig::new().with_host("  ").validate().is_err());
        assert!(
            BridgeConfig::new()
                .with_cache_ttl(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(matches!(
            BridgeConfig::new()
                .with_connect_timeout(Duration::ZERO)
                .validate(),
            Err(BridgeError::Config(_))
        ));
    }
}
