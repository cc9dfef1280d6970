//! Scheduler, dispatch, and execution configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration for the job scheduling system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub retention: RetentionConfig,

    #[serde(default)]
    pub dead_letter: DeadLetterConfig,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            worker: WorkerConfig::default(),
            scheduler: SchedulerConfig::default(),
            retry: RetryConfig::default(),
            retention: RetentionConfig::default(),
            dead_letter: DeadLetterConfig::default(),
        }
    }
}

impl JobConfig {
    /// Smaller worker pool, shorter safety sync interval, for local iteration.
    pub fn development() -> Self {
        Self {
            worker: WorkerConfig { concurrency: 2, ..Default::default() },
            scheduler: SchedulerConfig { safety_sync_interval_secs: 30, ..Default::default() },
            ..Self::default()
        }
    }

    pub fn production() -> Self {
        Self {
            worker: WorkerConfig { concurrency: 10, ..Default::default() },
            ..Self::default()
        }
    }
}

/// `WORKER_CONCURRENCY`, `DEFAULT_JOB_TIMEOUT`, `WORKER_RATE_LIMIT`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_worker_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_job_timeout_secs")]
    pub default_timeout_secs: i32,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            default_timeout_secs: 300,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl WorkerConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs.max(0) as u64)
    }
}

/// `WORKER_RATE_LIMIT`: bounds dispatch attempts per worker per window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_max")]
    pub max_attempts: u32,

    #[serde(default = "default_rate_limit_window_secs")]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { max_attempts: 100, window_secs: 60 }
    }
}

/// `SAFETY_SYNC_INTERVAL`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_safety_sync_interval_secs")]
    pub safety_sync_interval_secs: u64,

    #[serde(default = "default_safety_sync_limit")]
    pub safety_sync_limit: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { enabled: true, safety_sync_interval_secs: 300, safety_sync_limit: 1000 }
    }
}

impl SchedulerConfig {
    pub fn safety_sync_interval(&self) -> Duration {
        Duration::from_secs(self.safety_sync_interval_secs)
    }
}

/// `BACKOFF_BASE`, `DEFAULT_MAX_RETRIES`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_backoff_base_secs")]
    pub base_delay_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { base_delay_secs: 60, max_attempts: 3 }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_secs(self.base_delay_secs)
    }

    pub fn backoff(&self) -> crate::jobs::retry::ExponentialBackoff {
        crate::jobs::retry::ExponentialBackoff::new(self.base_delay(), self.max_attempts)
    }
}

/// `EXECUTION_RETENTION_DAYS`, `LOG_RETENTION_DAYS`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_execution_retention_days")]
    pub execution_retention_days: u32,

    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { execution_retention_days: 90, log_retention_days: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterConfig {
    #[serde(default = "default_dead_letter_capacity")]
    pub capacity: usize,
}

impl Default for DeadLetterConfig {
    fn default() -> Self {
        Self { capacity: crate::jobs::dead_letter::DEFAULT_DEAD_LETTER_CAPACITY }
    }
}

fn default_true() -> bool {
    true
}
fn default_worker_concurrency() -> usize {
    5
}
fn default_job_timeout_secs() -> i32 {
    300
}
fn default_rate_limit_max() -> u32 {
    100
}
fn default_rate_limit_window_secs() -> u64 {
    60
}
fn default_safety_sync_interval_secs() -> u64 {
    300
}
fn default_safety_sync_limit() -> i64 {
    1000
}
fn default_backoff_base_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}
fn default_execution_retention_days() -> u32 {
    90
}
fn default_log_retention_days() -> u32 {
    30
}
fn default_dead_letter_capacity() -> usize {
    crate::jobs::dead_letter::DEFAULT_DEAD_LETTER_CAPACITY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_documented_keys() {
        let config = JobConfig::default();
        assert_eq!(config.worker.concurrency, 5);
        assert_eq!(config.worker.default_timeout_secs, 300);
        assert_eq!(config.worker.rate_limit.max_attempts, 100);
        assert_eq!(config.scheduler.safety_sync_interval_secs, 300);
        assert_eq!(config.retry.base_delay_secs, 60);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retention.execution_retention_days, 90);
        assert_eq!(config.retention.log_retention_days, 30);
    }

    #[test]
    fn test_development_config_has_smaller_pool() {
        let config = JobConfig::development();
        assert_eq!(config.worker.concurrency, 2);
        assert_eq!(config.scheduler.safety_sync_interval_secs, 30);
    }

    #[test]
    fn test_retry_config_builds_matching_backoff() {
        let config = RetryConfig::default();
        let backoff = config.backoff();
        assert_eq!(backoff.delay_for(1), Some(Duration::from_secs(60)));
        assert!(backoff.is_final(3));
    }
}
