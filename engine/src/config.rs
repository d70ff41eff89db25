//! Client configuration loaded from environment variables.

use std::{env, path::PathBuf, time::Duration};

/// Timing of the sync loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Maximum time to wait for one poll response
    pub poll_timeout: Duration,
    /// Delay before retrying a failed poll
    pub retry_backoff: Duration,
}

impl SyncOptions {
    pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(600);
    pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(10);

    /// Check that the backoff is shorter than the poll timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_timeout.is_zero() {
            return Err(ConfigError::ZeroPollTimeout);
        }
        if self.retry_backoff >= self.poll_timeout {
            return Err(ConfigError::BackoffTooLong);
        }
        Ok(())
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            poll_timeout: Self::DEFAULT_POLL_TIMEOUT,
            retry_backoff: Self::DEFAULT_RETRY_BACKOFF,
        }
    }
}

/// Everything the watch client needs to start.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the marker server
    pub server_url: String,
    /// Path to the layer catalog JSON file
    pub layers_path: PathBuf,
    pub sync: SyncOptions,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_url = lookup("EVENTMAP_URL").unwrap_or_else(|| "http://localhost:8023".into());
        let layers_path = lookup("EVENTMAP_LAYERS")
            .map(PathBuf::from)
            .ok_or(ConfigError::MissingLayers)?;

        let sync = SyncOptions {
            poll_timeout: seconds(
                &lookup,
                "EVENTMAP_POLL_TIMEOUT_SECS",
                SyncOptions::DEFAULT_POLL_TIMEOUT,
            )?,
            retry_backoff: seconds(
                &lookup,
                "EVENTMAP_RETRY_BACKOFF_SECS",
                SyncOptions::DEFAULT_RETRY_BACKOFF,
            )?,
        };
        sync.validate()?;

        Ok(Self {
            server_url,
            layers_path,
            sync,
        })
    }
}

fn seconds<F>(lookup: &F, key: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map(Duration::from_secs)
            .map_err(|_| ConfigError::InvalidSeconds { key, value }),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("EVENTMAP_LAYERS environment variable is required")]
    MissingLayers,

    #[error("Invalid {key} value: '{value}'")]
    InvalidSeconds { key: &'static str, value: String },

    #[error("Poll timeout must be positive")]
    ZeroPollTimeout,

    #[error("Retry backoff must be shorter than the poll timeout")]
    BackoffTooLong,
}
