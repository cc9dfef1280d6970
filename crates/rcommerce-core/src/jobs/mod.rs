//! Durable, multi-tenant job scheduling
//!
//! Three components cooperate here:
//! - the **job store** (`store`) durably records job definitions and execution
//!   history;
//! - the **dispatch queue** (`queue`) delivers due jobs for execution exactly
//!   once per attempt, keyed by job id so re-delivery is idempotent;
//! - the **scheduler** (`scheduler`) and **executor** (`worker`) drive jobs
//!   from the store into the queue and back, including periodic
//!   reconciliation (`Safety Sync`) against jobs the queue lost track of.
//!
//! The scheduler and executor depend on each other only through the narrow
//! [`Rescheduler`] trait, which breaks what would otherwise be a cyclic
//! dependency between the two modules.

pub mod clock;
pub mod config;
pub mod cron;
pub mod dead_letter;
pub mod job;
pub mod metrics;
pub mod notify;
pub mod queue;
pub mod retry;
pub mod scheduler;
pub mod store;
pub mod worker;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::JobConfig;
pub use cron::CronEvaluator;
pub use dead_letter::{DeadLetterEntry, DeadLetterSink};
pub use job::{
    Execution, ExecutionId, ExecutionLog, ExecutionOutcome, ExecutionStatus, Job, JobFilter,
    JobId, JobKind, JobPatch, JobStatus, LogLevel, NewJob, Page, PageResult, Schedule, SortDirection,
    SortField,
};
pub use metrics::SchedulerMetrics;
pub use notify::{JobFailureNotification, LoggingNotificationSink, NotificationSink};
pub use queue::{DispatchQueueBackend, DispatchItem, QueueStats};
pub use retry::ExponentialBackoff;
pub use scheduler::Scheduler;
pub use store::{InMemoryJobStore, JobStoreBackend, PostgresJobStore};
pub use worker::Executor;

use serde::{Deserialize, Serialize};

/// Result alias used throughout the jobs module.
pub type JobProcessingResult<T> = Result<T, JobError>;

/// Error taxonomy covering the job store, dispatch queue, scheduler, and
/// executor. Control-surface handlers convert these into the crate-wide
/// `Error` via `status_code()`/`category()` at the edge.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum JobError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("forbidden transition: {0}")]
    ForbiddenTransition(String),

    #[error("scheduled time is in the past: {0}")]
    ScheduledTimeInPast(String),

    #[error("invalid cron expression: {0}")]
    InvalidCron(String),

    #[error("cron schedule never fires: {0}")]
    UnsatisfiableSchedule(String),

    #[error("job is gone: {0}")]
    JobGone(String),

    #[error("execution timed out: {0}")]
    ExecutionTimeout(String),

    #[error("execution failed: {0}")]
    ExecutionError(String),

    #[error("retries exhausted: {0}")]
    RetriesExhausted(String),

    #[error("job store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("dispatch queue unavailable: {0}")]
    QueueUnavailable(String),

    #[error("worker is shutting down")]
    WorkerShutdown,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl JobError {
    /// Map a `sqlx::Error` into the job error taxonomy. Row-not-found is
    /// distinguished from genuine connectivity failures.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => JobError::NotFound("row not found".to_string()),
            other => JobError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<JobError> for crate::Error {
    fn from(err: JobError) -> Self {
        match err {
            JobError::InvalidInput(msg)
            | JobError::ScheduledTimeInPast(msg)
            | JobError::InvalidCron(msg)
            | JobError::UnsatisfiableSchedule(msg) => crate::Error::Validation(msg),
            JobError::NotFound(msg) | JobError::JobGone(msg) => crate::Error::NotFound(msg),
            JobError::ForbiddenTransition(msg) | JobError::Conflict(msg) => {
                crate::Error::Validation(msg)
            }
            other => crate::Error::Other(other.to_string()),
        }
    }
}

impl From<crate::cache::CacheError> for JobError {
    fn from(err: crate::cache::CacheError) -> Self {
        JobError::QueueUnavailable(format!("cache error: {}", err))
    }
}

/// Breaks the scheduler/executor cycle: the executor calls back into the
/// scheduler to re-enqueue a recurring job's next occurrence without holding
/// a dependency on the full `Scheduler` type.
#[async_trait::async_trait]
pub trait Rescheduler: Send + Sync {
    async fn reschedule(&self, job: &Job) -> JobProcessingResult<()>;
}

/// The pluggable unit of work a job executes. Embedding binaries supply
/// their own implementations (HTTP callback, shell command, internal task)
/// and register them by `Job::name` or another routing key of their choosing.
#[async_trait::async_trait]
pub trait JobLogic: Send + Sync {
    async fn run(&self, job: &Job) -> JobProcessingResult<ExecutionOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_error_display() {
        let error = JobError::ExecutionError("boom".to_string());
        assert!(error.to_string().contains("boom"));

        let error = JobError::UnsatisfiableSchedule("0 0 30 2 *".to_string());
        assert!(error.to_string().contains("never fires"));
    }

    #[test]
    fn test_from_sqlx_row_not_found() {
        let error = JobError::from_sqlx(sqlx::Error::RowNotFound);
        assert!(matches!(error, JobError::NotFound(_)));
    }
}
