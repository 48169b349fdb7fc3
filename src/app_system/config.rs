use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::store::LockConfig;

/// Process-wide settings for the stock update subsystem.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub lots_path: PathBuf,
    pub chunk_size: usize,
    /// Pause between two processed batches.
    pub idle_poll_interval: Duration,
    pub lock: LockConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            lots_path: PathBuf::from("database/lots.json"),
            chunk_size: 100,
            idle_poll_interval: Duration::from_millis(10),
            lock: LockConfig::default(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse().ok()
}

fn millis_env(key: &str) -> Option<Duration> {
    parse_env(key).map(Duration::from_millis)
}

impl AppConfig {
    /// Defaults overridden by `STOCK_*` environment variables. Values that do
    /// not parse are ignored.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let lock = LockConfig {
            stale: millis_env("STOCK_LOCK_STALE_MS").unwrap_or(defaults.lock.stale),
            retries: parse_env("STOCK_LOCK_RETRIES").unwrap_or(defaults.lock.retries),
            factor: parse_env("STOCK_LOCK_FACTOR").unwrap_or(defaults.lock.factor),
            min_backoff: millis_env("STOCK_LOCK_MIN_BACKOFF_MS").unwrap_or(defaults.lock.min_backoff),
            max_backoff: millis_env("STOCK_LOCK_MAX_BACKOFF_MS").unwrap_or(defaults.lock.max_backoff),
        };

        Self {
            lots_path: parse_env("STOCK_LOTS_PATH").unwrap_or(defaults.lots_path),
            chunk_size: parse_env("STOCK_CHUNK_SIZE").unwrap_or(defaults.chunk_size),
            idle_poll_interval: millis_env("STOCK_IDLE_POLL_MS").unwrap_or(defaults.idle_poll_interval),
            lock,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk size must be greater than 0".to_string()));
        }
        if self.lock.stale.is_zero() {
            return Err(ConfigError::Invalid("lock stale threshold must be greater than 0".to_string()));
        }
        if !(self.lock.factor >= 1.0) {
            return Err(ConfigError::Invalid("lock backoff factor must be at least 1".to_string()));
        }
        if self.lock.min_backoff > self.lock.max_backoff {
            return Err(ConfigError::Invalid(
                "lock min backoff must not exceed max backoff".to_string(),
            ));
        }
        Ok(())
    }
}
