//! services/telemetry/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub nominatim_base_url: String,
    pub nominatim_user_agent: String,
    pub classify_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Road Classifier Settings ---
        let nominatim_base_url = std::env::var("NOMINATIM_BASE_URL")
            .unwrap_or_else(|_| "https://nominatim.openstreetmap.org".to_string());

        let nominatim_user_agent = std::env::var("NOMINATIM_USER_AGENT")
            .unwrap_or_else(|_| "MyDriveTelemetry/1.0".to_string());

        let classify_timeout_str =
            std::env::var("CLASSIFY_TIMEOUT_MS").unwrap_or_else(|_| "5000".to_string());
        let classify_timeout_ms = classify_timeout_str.parse::<u64>().map_err(|_| {
            ConfigError::InvalidValue(
                "CLASSIFY_TIMEOUT_MS".to_string(),
                format!("'{}' is not a valid number of milliseconds", classify_timeout_str),
            )
        })?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            nominatim_base_url,
            nominatim_user_agent,
            classify_timeout: Duration::from_millis(classify_timeout_ms),
        })
    }
}
