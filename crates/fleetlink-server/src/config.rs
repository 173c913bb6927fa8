//! # Process configuration (§6.1)
//!
//! Loaded once at startup from the environment via `envy`, the serde-backed deserializer
//! that is this workspace's analogue of the corpus's typed-config convention. Field names
//! are upper-cased automatically by `envy::from_env` to match the `PORT`/`SITL_CONNECTION`/
//! `DATABASE_URL`/`JWT_SECRET` vocabulary of §6.

use fleetlink_hub::commands::parse_connection_string;
use serde::Deserialize;

fn default_port() -> u16 {
    5000
}

#[derive(Debug, Deserialize)]
pub struct RawConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    pub sitl_connection: Option<String>,
    pub database_url: Option<String>,
    pub jwt_secret: String,
}

/// Validated process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub sitl_connection: Option<String>,
    pub database_url: Option<String>,
    pub jwt_secret: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration from the environment: {0}")]
    Env(#[from] envy::Error),
    #[error("SITL_CONNECTION is malformed: {0}")]
    BadSitlConnection(String),
}

impl Config {
    /// Loads and validates configuration from the process environment (§6.1). `PORT`
    /// defaults to `5000`; `SITL_CONNECTION` must match the §4.7 connection-string grammar
    /// when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw: RawConfig = envy::from_env()?;

        if let Some(conn) = &raw.sitl_connection {
            parse_connection_string(conn).map_err(|_| ConfigError::BadSitlConnection(conn.clone()))?;
        }

        Ok(Config {
            port: raw.port,
            sitl_connection: raw.sitl_connection,
            database_url: raw.database_url,
            jwt_secret: raw.jwt_secret,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_a_malformed_sitl_connection() {
        std::env::set_var("JWT_SECRET", "test-secret");
        std::env::set_var("SITL_CONNECTION", "not-a-connection-string");
        let result = Config::from_env();
        std::env::remove_var("SITL_CONNECTION");
        std::env::remove_var("JWT_SECRET");
        assert!(matches!(result, Err(ConfigError::BadSitlConnection(_))));
    }
}
