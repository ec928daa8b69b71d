//! Process configuration, read once at startup and passed down explicitly

use anyhow::Result;
use common::database::DatabaseConfig;
use std::net::SocketAddr;

use crate::{jwt::JwtConfig, revocation::RevocationConfig};

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address
    pub bind_address: SocketAddr,
}

impl ServerConfig {
    /// Create a new ServerConfig from environment variables
    ///
    /// # Environment Variables
    /// - `AUTH_BIND_ADDRESS`: Listen address (default: "0.0.0.0:3000")
    pub fn from_env() -> Result<Self> {
        let bind_address = std::env::var("AUTH_BIND_ADDRESS")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid AUTH_BIND_ADDRESS: {}", e))?;

        Ok(ServerConfig { bind_address })
    }
}

/// Everything the service reads from its environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub revocation: RevocationConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            jwt: JwtConfig::from_env()?,
            revocation: RevocationConfig::from_env()?,
        })
    }
}
