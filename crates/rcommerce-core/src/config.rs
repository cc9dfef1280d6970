use serde::{Deserialize, Serialize};
use std::path::Path;

/// Process-level configuration for the scheduler service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub rate_limiting: RateLimitConfig,

    #[serde(default)]
    pub features: FeatureFlags,

    #[serde(default)]
    pub jobs: crate::jobs::config::JobConfig,

    /// Redis connection used by the dispatch queue backend.
    #[serde(default)]
    pub cache: crate::cache::RedisConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            rate_limiting: RateLimitConfig::default(),
            features: FeatureFlags::default(),
            jobs: crate::jobs::config::JobConfig::default(),
            cache: crate::cache::RedisConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &str) -> Result<Self, crate::Error> {
        use crate::Error;

        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, crate::Error> {
        if let Ok(config_path) = std::env::var("RCOMMERCE_CONFIG") {
            return Self::load(&config_path);
        }

        let default_paths = [
            "./config/default.toml",
            "./config/production.toml",
            "/etc/rcommerce/config.toml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        use crate::Error;

        if self.server.port == 0 || self.server.port > 65535 {
            return Err(Error::Config("Invalid server port".to_string()));
        }

        if self.database.pool_size == 0 {
            return Err(Error::Config("Database pool size must be > 0".to_string()));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_workers")]
    pub worker_threads: usize,

    #[serde(default = "default_graceful_shutdown")]
    pub graceful_shutdown_timeout_secs: u64,

    #[serde(default)]
    pub cors: CorsConfig,

    #[serde(default)]
    pub limits: LimitsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            worker_threads: default_workers(),
            graceful_shutdown_timeout_secs: default_graceful_shutdown(),
            cors: CorsConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    0 // 0 means use number of CPU cores
}

fn default_graceful_shutdown() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub allowed_origins: Vec<String>,

    #[serde(default)]
    pub allowed_methods: Vec<String>,

    #[serde(default)]
    pub allowed_headers: Vec<String>,

    #[serde(default = "default_true")]
    pub allow_credentials: bool,

    #[serde(default)]
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: vec!["*".to_string()],
            allowed_methods: vec!["GET", "POST", "PUT", "PATCH", "DELETE"]
                .into_iter()
                .map(String::from)
                .collect(),
            allowed_headers: vec!["Content-Type", "Authorization"]
                .into_iter()
                .map(String::from)
                .collect(),
            allow_credentials: true,
            max_age: Some(3600),
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_request_size")]
    pub max_request_size_mb: u64,

    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u64,

    #[serde(default = "default_burst")]
    pub rate_limit_burst: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_size_mb: default_max_request_size(),
            rate_limit_per_minute: default_rate_limit(),
            rate_limit_burst: default_burst(),
        }
    }
}

fn default_max_request_size() -> u64 {
    10 // 10MB
}

fn default_rate_limit() -> u64 {
    1000 // requests per minute
}

fn default_burst() -> u64 {
    200
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_type")]
    pub db_type: DatabaseType,

    pub host: String,

    #[serde(default = "default_db_port")]
    pub port: u16,

    pub database: String,
    pub username: String,
    pub password: String,

    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    #[serde(default)]
    pub ssl_mode: SslMode,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: default_db_type(),
            host: "localhost".to_string(),
            port: default_db_port(),
            database: "rcommerce".to_string(),
            username: "rcommerce".to_string(),
            password: "password".to_string(),
            pool_size: default_pool_size(),
            ssl_mode: SslMode::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DatabaseType {
    Postgres,
}

fn default_db_type() -> DatabaseType {
    DatabaseType::Postgres
}

fn default_db_port() -> u16 {
    5432
}

fn default_pool_size() -> u32 {
    20
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum SslMode {
    Disable,
    Prefer,
    Require,
}

impl Default for SslMode {
    fn default() -> Self {
        SslMode::Prefer
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: LogFormat,

    #[serde(default)]
    pub file: Option<FileLogConfig>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Json
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum LogFormat {
    Json,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileLogConfig {
    pub path: String,
    pub rotation: LogRotation,
    #[serde(default)]
    pub max_size_mb: Option<u64>,
    #[serde(default)]
    pub max_files: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum LogRotation {
    Daily,
    Hourly,
}

/// Rate limiting for the control-surface API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_rate_limit_minute")]
    pub requests_per_minute: u32,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_per_ip: u32,

    #[serde(default)]
    pub blocklist: Vec<String>,

    #[serde(default)]
    pub allowlist: Vec<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 60,
            max_concurrent_per_ip: 10,
            blocklist: vec![],
            allowlist: vec![],
        }
    }
}

fn default_rate_limit_minute() -> u32 {
    60
}
fn default_max_concurrent() -> u32 {
    10
}

/// Feature flags
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFlags {
    #[serde(default = "default_true")]
    pub debug_api: bool,

    #[serde(default = "default_true")]
    pub metrics: bool,

    #[serde(default = "default_true")]
    pub health_check: bool,

    #[serde(default)]
    pub experimental: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            debug_api: true,
            metrics: true,
            health_check: true,
            experimental: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.pool_size, 20);
        assert_eq!(config.jobs.worker.concurrency, 5);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.server.port = 99999;
        assert!(config.validate().is_err());

        config.server.port = 8080;
        assert!(config.validate().is_ok());
    }
}
