//! Configuration management for the server.

use std::{env, time::Duration};

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// How long a poll request is held open waiting for a new version
    pub poll_hold: Duration,
}

impl Config {
    pub const DEFAULT_PORT: u16 = 8023;
    pub const DEFAULT_POLL_HOLD: Duration = Duration::from_secs(300);

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = match env::var("PORT") {
            Ok(port) => port.parse().map_err(|_| ConfigError::InvalidPort)?,
            Err(_) => Self::DEFAULT_PORT,
        };

        let poll_hold = match env::var("POLL_HOLD_SECS") {
            Ok(secs) => secs
                .parse::<u64>()
                .ok()
                .filter(|&secs| secs > 0)
                .map(Duration::from_secs)
                .ok_or(ConfigError::InvalidPollHold)?,
            Err(_) => Self::DEFAULT_POLL_HOLD,
        };

        Ok(Self {
            host,
            port,
            poll_hold,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: Self::DEFAULT_PORT,
            poll_hold: Self::DEFAULT_POLL_HOLD,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid POLL_HOLD_SECS value, expected a positive number of seconds")]
    InvalidPollHold,
}
