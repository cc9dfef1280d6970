//! Core data types: jobs, executions, and execution logs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique job identifier
pub type JobId = Uuid;

/// Unique execution identifier
pub type ExecutionId = Uuid;

/// Whether a job runs once or on a recurring schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum JobKind {
    OneTime,
    Recurring,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::OneTime => write!(f, "one_time"),
            JobKind::Recurring => write!(f, "recurring"),
        }
    }
}

/// A job's schedule. Exactly one variant is ever populated, and it must
/// match the job's `kind` (`Immediate`/`At` only with `OneTime`, `Cron`
/// only with `Recurring`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    Immediate,
    At { at: DateTime<Utc> },
    Cron { expression: String },
}

impl Schedule {
    pub fn matches_kind(&self, kind: JobKind) -> bool {
        match (self, kind) {
            (Schedule::Immediate, JobKind::OneTime) => true,
            (Schedule::At { .. }, JobKind::OneTime) => true,
            (Schedule::Cron { .. }, JobKind::Recurring) => true,
            _ => false,
        }
    }
}

/// Job lifecycle status (see the state machine in the scheduler module).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Active,
    Paused,
    Completed,
    Failed,
    Deleted,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Active => write!(f, "active"),
            JobStatus::Paused => write!(f, "paused"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Deleted => write!(f, "deleted"),
        }
    }
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Deleted)
    }

    pub fn has_next_run(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Active | JobStatus::Paused)
    }
}

/// A scheduled unit of work belonging to a tenant (`owner`).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    pub id: JobId,
    pub owner: String,
    pub name: String,
    pub description: Option<String>,
    pub kind: JobKind,
    pub schedule_kind: String,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub cron_expression: Option<String>,
    pub next_run: Option<DateTime<Utc>>,
    pub payload: serde_json::Value,
    pub timeout_secs: i32,
    pub max_retries: i32,
    pub status: JobStatus,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_executed_at: Option<DateTime<Utc>>,
}

/// Minimum and maximum accepted values for `timeout_secs` and `max_retries`.
pub const MIN_TIMEOUT_SECS: i32 = 1;
pub const MAX_TIMEOUT_SECS: i32 = 3600;
pub const MIN_MAX_RETRIES: i32 = 0;
pub const MAX_MAX_RETRIES: i32 = 10;

impl Job {
    /// Extract the `Schedule` this job's flattened columns represent.
    pub fn schedule(&self) -> Schedule {
        match self.schedule_kind.as_str() {
            "at" => Schedule::At {
                at: self.scheduled_time.expect("schedule_kind=at implies scheduled_time"),
            },
            "cron" => Schedule::Cron {
                expression: self
                    .cron_expression
                    .clone()
                    .expect("schedule_kind=cron implies cron_expression"),
            },
            _ => Schedule::Immediate,
        }
    }

    pub fn set_schedule(&mut self, schedule: &Schedule) {
        match schedule {
            Schedule::Immediate => {
                self.schedule_kind = "immediate".to_string();
                self.scheduled_time = None;
                self.cron_expression = None;
            }
            Schedule::At { at } => {
                self.schedule_kind = "at".to_string();
                self.scheduled_time = Some(*at);
                self.cron_expression = None;
            }
            Schedule::Cron { expression } => {
                self.schedule_kind = "cron".to_string();
                self.scheduled_time = None;
                self.cron_expression = Some(expression.clone());
            }
        }
    }

    pub fn is_recurring(&self) -> bool {
        matches!(self.kind, JobKind::Recurring)
    }
}

/// The disposition of a single execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Success,
    Failed,
    Timeout,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Running => write!(f, "running"),
            ExecutionStatus::Success => write!(f, "success"),
            ExecutionStatus::Failed => write!(f, "failed"),
            ExecutionStatus::Timeout => write!(f, "timeout"),
        }
    }
}

/// One attempt to run a job. Immutable once it reaches a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Execution {
    pub id: ExecutionId,
    pub job_id: JobId,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: ExecutionStatus,
    pub retry_attempt: i32,
    pub duration_ms: Option<i64>,
    pub error_message: Option<String>,
    pub output: Option<serde_json::Value>,
}

impl Execution {
    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, ExecutionStatus::Running)
    }
}

/// Log severity for execution logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warning => write!(f, "warning"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// An append-only log line attached to one execution.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ExecutionLog {
    pub id: Uuid,
    pub execution_id: ExecutionId,
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: Option<serde_json::Value>,
}

/// Fields accepted by `create_job`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJob {
    pub name: String,
    pub description: Option<String>,
    pub kind: JobKind,
    pub schedule: Schedule,
    pub payload: serde_json::Value,
    pub timeout_secs: Option<i32>,
    pub max_retries: Option<i32>,
}

/// Fields accepted by `update_job`. `None` means "leave unchanged".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub cron_expression: Option<String>,
    pub payload: Option<serde_json::Value>,
    pub timeout_secs: Option<i32>,
    pub status: Option<JobStatus>,
}

/// Filter for `list_jobs`.
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub kind: Option<JobKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    NextRun,
    Name,
    UpdatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
    pub sort: SortField,
    pub direction: SortDirection,
}

impl Default for Page {
    fn default() -> Self {
        Self { limit: 50, offset: 0, sort: SortField::CreatedAt, direction: SortDirection::Desc }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    pub total: i64,
}

/// Outcome of a single execution attempt, reported by the executor back
/// into the store via `finalize_execution`.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    Success { output: Option<serde_json::Value> },
    Timeout { message: String },
    Failure { message: String },
}

impl ExecutionOutcome {
    pub fn status(&self) -> ExecutionStatus {
        match self {
            ExecutionOutcome::Success { .. } => ExecutionStatus::Success,
            ExecutionOutcome::Timeout { .. } => ExecutionStatus::Timeout,
            ExecutionOutcome::Failure { .. } => ExecutionStatus::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_terminal() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Deleted.is_terminal());
        assert!(!JobStatus::Active.is_terminal());
    }

    #[test]
    fn test_job_status_has_next_run() {
        assert!(JobStatus::Active.has_next_run());
        assert!(JobStatus::Paused.has_next_run());
        assert!(!JobStatus::Completed.has_next_run());
        assert!(!JobStatus::Deleted.has_next_run());
    }

    #[test]
    fn test_schedule_matches_kind() {
        assert!(Schedule::Immediate.matches_kind(JobKind::OneTime));
        assert!(!Schedule::Immediate.matches_kind(JobKind::Recurring));
        assert!(Schedule::Cron { expression: "* * * * *".into() }.matches_kind(JobKind::Recurring));
        assert!(!Schedule::Cron { expression: "* * * * *".into() }.matches_kind(JobKind::OneTime));
    }

    #[test]
    fn test_job_set_and_get_schedule() {
        let mut job = test_job();
        let sched = Schedule::Cron { expression: "*/5 * * * *".into() };
        job.set_schedule(&sched);
        assert_eq!(job.schedule(), sched);
    }

    fn test_job() -> Job {
        Job {
            id: Uuid::new_v4(),
            owner: "tenant-1".into(),
            name: "test".into(),
            description: None,
            kind: JobKind::Recurring,
            schedule_kind: "immediate".into(),
            scheduled_time: None,
            cron_expression: None,
            next_run: Some(Utc::now()),
            payload: serde_json::json!({}),
            timeout_secs: 300,
            max_retries: 3,
            status: JobStatus::Active,
            retry_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_executed_at: None,
        }
    }
}
