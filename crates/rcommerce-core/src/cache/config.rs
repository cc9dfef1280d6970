//! Redis connection configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Redis connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis server URL (redis://host:port/db)
    pub url: String,

    /// Use TLS/SSL for connection
    #[serde(default = "default_false")]
    pub use_tls: bool,

    /// Connection pool size
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Connection timeout
    #[serde(default = "default_timeout")]
    pub connect_timeout_ms: u64,

    /// Retry failed connections
    #[serde(default = "default_true")]
    pub retry_on_failure: bool,

    /// Max retry attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Retry delay in ms
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// Key prefix to avoid collisions
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Database number (0-15)
    #[serde(default)]
    pub database: u8,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/0".to_string(),
            use_tls: false,
            pool_size: 20,
            connect_timeout_ms: 5000,
            retry_on_failure: true,
            max_retries: 3,
            retry_delay_ms: 1000,
            key_prefix: "scheduler".to_string(),
            database: 0,
        }
    }
}

impl RedisConfig {
    /// Development configuration (local Redis)
    pub fn development() -> Self {
        Self {
            pool_size: 5,
            connect_timeout_ms: 2000,
            ..Self::default()
        }
    }

    /// Production configuration
    pub fn production() -> Self {
        Self {
            pool_size: 50,
            connect_timeout_ms: 3000,
            max_retries: 5,
            retry_delay_ms: 500,
            key_prefix: "scheduler:prod".to_string(),
            ..Self::default()
        }
    }

    /// Get connect timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Get retry delay as Duration
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_pool_size() -> usize {
    20
}
fn default_timeout() -> u64 {
    5000
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    1000
}
fn default_key_prefix() -> String {
    "scheduler".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_redis_config() {
        let config = RedisConfig::default();
        assert_eq!(config.pool_size, 20);
        assert_eq!(config.key_prefix, "scheduler");
    }

    #[test]
    fn test_development_config() {
        let config = RedisConfig::development();
        assert_eq!(config.pool_size, 5);
    }
}
