//! Store configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//!
//! ## Optional
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8083)
//! - `DATABASE_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `STORE_PAGE_SIZE` - Products per listing page, 1 to 100 (default: 10)
//! - `STORE_TOKEN_TTL_HOURS` - Bearer token lifetime (default: 168)
//! - `NATS_URL` - Publish domain events to NATS when set
//! - `NATS_SUBJECT_PREFIX` - Subject prefix for published events (default: store)

use std::net::{IpAddr, SocketAddr};

use chrono::Duration;
use secrecy::SecretString;
use thiserror::Error;

const MAX_PAGE_SIZE: u32 = 100;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Store application configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    pub database_max_connections: u32,
    /// IP address to bind the server to
    pub host: IpAddr,
    pub port: u16,
    /// Page size of the product listing
    pub page_size: u32,
    pub token_ttl_hours: i64,
    pub nats: Option<NatsConfig>,
}

/// Where domain events are published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NatsConfig {
    pub url: String,
    pub subject_prefix: String,
}

impl StoreConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL")
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;
        let host: IpAddr = parse_or_default(&lookup, "HOST", "0.0.0.0")?;
        let port: u16 = parse_or_default(&lookup, "PORT", "8083")?;
        let database_max_connections: u32 = parse_or_default(&lookup, "DATABASE_MAX_CONNECTIONS", "10")?;

        let page_size: u32 = parse_or_default(&lookup, "STORE_PAGE_SIZE", "10")?;
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(ConfigError::InvalidEnvVar(
                "STORE_PAGE_SIZE".to_string(),
                format!("must be between 1 and {MAX_PAGE_SIZE} (got {page_size})"),
            ));
        }

        let token_ttl_hours: i64 = parse_or_default(&lookup, "STORE_TOKEN_TTL_HOURS", "168")?;
        if token_ttl_hours < 1 {
            return Err(ConfigError::InvalidEnvVar(
                "STORE_TOKEN_TTL_HOURS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let nats = lookup("NATS_URL").map(|url| NatsConfig {
            url,
            subject_prefix: lookup("NATS_SUBJECT_PREFIX").unwrap_or_else(|| "store".to_string()),
        });

        Ok(Self { database_url, database_max_connections, host, port, page_size, token_ttl_hours, nats })
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::hours(self.token_ttl_hours)
    }

    /// Configuration for tests and local runs without a database.
    pub fn for_testing() -> Self {
        Self {
            database_url: SecretString::from("postgres://localhost/store_test"),
            database_max_connections: 1,
            host: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            page_size: 10,
            token_ttl_hours: 1,
            nats: None,
        }
    }
}

fn parse_or_default<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .unwrap_or_else(|| default.to_string())
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
