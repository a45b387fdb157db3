//! Configuration management for the Bakery Production Backend
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with BAKERY_ prefix

use std::net::{AddrParseError, SocketAddr};

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Outbox dispatcher configuration
    pub outbox: OutboxConfig,

    /// External marketplace configuration
    pub marketplace: MarketplaceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

impl ServerConfig {
    /// Socket address built from the configured host and port.
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        Ok(SocketAddr::new(self.host.parse()?, self.port))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutboxConfig {
    /// Seconds between background poll runs
    pub poll_interval_secs: u64,

    /// Maximum jobs dispatched per poll
    pub batch_limit: i64,

    /// Provider key stamped on every queued job
    pub provider: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MarketplaceConfig {
    /// Marketplace intake API endpoint
    pub api_endpoint: String,

    /// Marketplace API key
    pub api_key: String,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("BAKERY_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("outbox.poll_interval_secs", 15)?
            .set_default("outbox.batch_limit", 25)?
            .set_default("outbox.provider", "external_market")?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (BAKERY_ prefix)
            .add_source(
                Environment::with_prefix("BAKERY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_addr_uses_configured_host_and_port() {
        let server = ServerConfig {
            port: 8080,
            host: "127.0.0.1".to_string(),
        };
        assert_eq!(server.socket_addr().unwrap().to_string(), "127.0.0.1:8080");

        let default = ServerConfig::default();
        assert_eq!(default.socket_addr().unwrap().to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn socket_addr_rejects_a_bad_host() {
        let server = ServerConfig {
            port: 8080,
            host: "bakery.local".to_string(),
        };
        assert!(server.socket_addr().is_err());
    }
}
