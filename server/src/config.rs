//! Configuration management for the server.
//!
//! Everything comes from environment variables; `.env` is loaded first.

use std::env;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Upper bound on pooled database connections
    pub max_connections: u32,
    /// When set, bearer tokens are checked against the `sessions` table.
    /// When unset (development), the token is taken as the user ID.
    pub auth_secret: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = match var("PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidPort)?,
            None => 3000,
        };

        let database_url = var("DATABASE_URL")
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::MissingDatabaseUrl)?;

        let max_connections = match var("DATABASE_MAX_CONNECTIONS") {
            Some(value) => match value.parse() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::InvalidMaxConnections),
            },
            None => 10,
        };

        let auth_secret = var("AUTH_SECRET").filter(|s| !s.is_empty());

        Ok(Self {
            host,
            port,
            database_url,
            max_connections,
            auth_secret,
        })
    }

    /// Whether tokens are validated against stored sessions.
    pub fn validates_sessions(&self) -> bool {
        self.auth_secret.is_some()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATABASE_URL environment variable is required")]
    MissingDatabaseUrl,

    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("DATABASE_MAX_CONNECTIONS must be a positive integer")]
    InvalidMaxConnections,
}
