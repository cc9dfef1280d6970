pub mod config;
pub mod error;
pub mod traits;
pub mod common;
pub mod repository;
pub mod db;
pub mod cache;
pub mod jobs;

// Re-export commonly used types
pub use error::{Error, Result};
pub use config::Config;
pub use traits::{Repository, Service};
pub use repository::{Database, create_pool};
pub use db::migrate::{Migrator, auto_migrate, DbStatus};

pub use jobs::{
    Clock, DeadLetterEntry, DeadLetterSink, DispatchQueueBackend, Execution, ExecutionLog,
    ExecutionOutcome, Executor, ExponentialBackoff, Job, JobConfig, JobError, JobKind, JobLogic,
    JobStatus, JobStoreBackend, JobFailureNotification, NewJob, NotificationSink, Rescheduler,
    Scheduler, SchedulerMetrics, SystemClock,
};

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

impl Error {
    pub fn not_implemented<T: Into<String>>(msg: T) -> Self {
        Error::Other(format!("Not implemented: {}", msg.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_version_available() {
        assert!(!VERSION.is_empty());
    }
    
    #[test]
    fn test_error_creation() {
        let err = Error::validation("Test validation error");
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.category(), "validation");
    }
}