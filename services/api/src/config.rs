//! services/api/src/config.rs
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
    pub log_level: Level,
    /// Postgres connection string. Without it the service keeps keys,
    /// question sets and completed surveys in memory.
    pub database_url: Option<String>,
    pub discord_token: String,
    pub relay_channel_name: String,
    pub relay_timeout: Duration,
    /// Idle sessions are only expired when this is set.
    pub session_idle_timeout: Option<Duration>,
    pub session_sweep_interval: Duration,
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

        // --- Load Server Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3001".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        // --- Load Discord Settings ---
        let discord_token = std::env::var("DISCORD_TOKEN")
            .map_err(|_| ConfigError::MissingVar("DISCORD_TOKEN".to_string()))?;
        let relay_channel_name =
            std::env::var("RELAY_CHANNEL_NAME").unwrap_or_else(|_| "webform-bot".to_string());
        let relay_timeout = Duration::from_secs(secs_var("RELAY_TIMEOUT_SECS")?.unwrap_or(30));

        // --- Load Session Expiry Settings ---
        let session_idle_timeout = secs_var("SESSION_IDLE_TIMEOUT_SECS")?.map(Duration::from_secs);
        let session_sweep_interval =
            Duration::from_secs(secs_var("SESSION_SWEEP_INTERVAL_SECS")?.unwrap_or(60));

        Ok(Self {
            bind_address,
            log_level,
            database_url,
            discord_token,
            relay_channel_name,
            relay_timeout,
            session_idle_timeout,
            session_sweep_interval,
        })
    }
}

/// Reads an optional, strictly positive number of seconds.
fn secs_var(name: &str) -> Result<Option<u64>, ConfigError> {
    let Ok(raw) = std::env::var(name) else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Some(secs)),
        _ => Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("'{}' is not a positive number of seconds", raw),
        )),
    }
}
