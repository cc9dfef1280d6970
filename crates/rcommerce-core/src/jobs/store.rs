//! Durable job store
//!
//! `JobStoreBackend` is the polymorphism seam called out by the design: a
//! relational (Postgres) implementation backs production, an in-memory
//! implementation backs fast unit tests. Both enforce the same invariants
//! (schedule/kind compatibility, timeout/retry ranges, soft delete).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::job::*;
use super::JobError;

pub type StoreResult<T> = Result<T, JobError>;

#[async_trait]
pub trait JobStoreBackend: Send + Sync {
    async fn create_job(&self, owner: &str, new_job: &NewJob, next_run: Option<DateTime<Utc>>) -> StoreResult<Job>;
    async fn get_job(&self, owner: &str, id: JobId) -> StoreResult<Option<Job>>;
    /// Unscoped lookup for internal use by the executor, which only has a
    /// job id from the dispatch queue and no tenant context to check against.
    async fn get_job_by_id(&self, id: JobId) -> StoreResult<Option<Job>>;
    async fn list_jobs(&self, owner: &str, filter: &JobFilter, page: &Page) -> StoreResult<PageResult<Job>>;
    async fn update_job(&self, owner: &str, id: JobId, patch: &JobPatch, next_run: Option<DateTime<Utc>>) -> StoreResult<Job>;
    async fn soft_delete_job(&self, owner: &str, id: JobId) -> StoreResult<()>;
    async fn set_status(&self, owner: &str, id: JobId, status: JobStatus, next_run: Option<DateTime<Utc>>) -> StoreResult<Job>;
    /// Unscoped terminal-failure transition, used by the executor once
    /// retries are exhausted.
    async fn fail_job(&self, id: JobId) -> StoreResult<()>;
    async fn claim_due_jobs(&self, limit: i64, horizon: DateTime<Utc>) -> StoreResult<Vec<Job>>;
    async fn upcoming_jobs(&self, owner: &str, horizon: DateTime<Utc>) -> StoreResult<Vec<Job>>;

    async fn begin_execution(&self, job_id: JobId, retry_attempt: i32) -> StoreResult<Execution>;
    async fn finalize_execution(&self, execution_id: ExecutionId, outcome: &ExecutionOutcome) -> StoreResult<Execution>;
    async fn set_next_run(&self, job_id: JobId, next_run: Option<DateTime<Utc>>) -> StoreResult<()>;
    async fn mark_last_executed(&self, job_id: JobId, at: DateTime<Utc>) -> StoreResult<()>;
    async fn mark_completed(&self, job_id: JobId) -> StoreResult<()>;
    async fn increment_retry_count(&self, job_id: JobId) -> StoreResult<()>;
    async fn reset_retry_count(&self, job_id: JobId) -> StoreResult<()>;

    async fn append_log(&self, execution_id: ExecutionId, level: LogLevel, message: &str, metadata: Option<serde_json::Value>) -> StoreResult<ExecutionLog>;
    async fn get_executions(&self, owner: &str, job_id: JobId, page: &Page) -> StoreResult<PageResult<Execution>>;
    async fn get_execution(&self, owner: &str, execution_id: ExecutionId) -> StoreResult<Option<Execution>>;
    async fn get_execution_logs(&self, owner: &str, execution_id: ExecutionId) -> StoreResult<Vec<ExecutionLog>>;
}

/// Postgres-backed implementation. Schema in `migrations/`.
pub struct PostgresJobStore {
    pool: PgPool,
}

impl PostgresJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn validate_new_job(new_job: &NewJob) -> StoreResult<()> {
    if !new_job.schedule.matches_kind(new_job.kind) {
        return Err(JobError::InvalidInput("schedule does not match job kind".into()));
    }
    if let Some(timeout) = new_job.timeout_secs {
        if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&timeout) {
            return Err(JobError::InvalidInput(format!("timeout_secs must be in [{}, {}]", MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS)));
        }
    }
    if let Some(max_retries) = new_job.max_retries {
        if !(MIN_MAX_RETRIES..=MAX_MAX_RETRIES).contains(&max_retries) {
            return Err(JobError::InvalidInput(format!("max_retries must be in [{}, {}]", MIN_MAX_RETRIES, MAX_MAX_RETRIES)));
        }
    }
    Ok(())
}

#[async_trait]
impl JobStoreBackend for PostgresJobStore {
    async fn create_job(&self, owner: &str, new_job: &NewJob, next_run: Option<DateTime<Utc>>) -> StoreResult<Job> {
        validate_new_job(new_job)?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        let mut job = Job {
            id,
            owner: owner.to_string(),
            name: new_job.name.clone(),
            description: new_job.description.clone(),
            kind: new_job.kind,
            schedule_kind: String::new(),
            scheduled_time: None,
            cron_expression: None,
            next_run,
            payload: new_job.payload.clone(),
            timeout_secs: new_job.timeout_secs.unwrap_or(300),
            max_retries: new_job.max_retries.unwrap_or(3),
            status: JobStatus::Active,
            retry_count: 0,
            created_at: now,
            updated_at: now,
            last_executed_at: None,
        };
        job.set_schedule(&new_job.schedule);

        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, owner, name, description, kind, schedule_kind, scheduled_time,
                cron_expression, next_run, payload, timeout, max_retries, status,
                retry_count, created_at, updated_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16)
            "#,
        )
        .bind(job.id)
        .bind(&job.owner)
        .bind(&job.name)
        .bind(&job.description)
        .bind(job.kind)
        .bind(&job.schedule_kind)
        .bind(job.scheduled_time)
        .bind(&job.cron_expression)
        .bind(job.next_run)
        .bind(&job.payload)
        .bind(job.timeout_secs)
        .bind(job.max_retries)
        .bind(job.status)
        .bind(job.retry_count)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        .map_err(JobError::from_sqlx)?;

        Ok(job)
    }

    async fn get_job(&self, owner: &str, id: JobId) -> StoreResult<Option<Job>> {
        sqlx::query_as::<_, Job>(
            "SELECT id, owner, name, description, kind, schedule_kind, scheduled_time, cron_expression, \
             next_run, payload, timeout AS timeout_secs, max_retries, status, retry_count, created_at, \
             updated_at, last_executed_at FROM jobs WHERE owner = $1 AND id = $2 AND status != 'deleted'",
        )
        .bind(owner)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(JobError::from_sqlx)
    }

    async fn get_job_by_id(&self, id: JobId) -> StoreResult<Option<Job>> {
        sqlx::query_as::<_, Job>(
            "SELECT id, owner, name, description, kind, schedule_kind, scheduled_time, cron_expression, \
             next_run, payload, timeout AS timeout_secs, max_retries, status, retry_count, created_at, \
             updated_at, last_executed_at FROM jobs WHERE id = $1 AND status != 'deleted'",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(JobError::from_sqlx)
    }

    async fn fail_job(&self, id: JobId) -> StoreResult<()> {
        sqlx::query("UPDATE jobs SET status='failed', next_run=NULL, updated_at=now() WHERE id=$1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(JobError::from_sqlx)?;
        Ok(())
    }

    async fn list_jobs(&self, owner: &str, filter: &JobFilter, page: &Page) -> StoreResult<PageResult<Job>> {
        let sort_col = match page.sort {
            SortField::CreatedAt => "created_at",
            SortField::NextRun => "next_run",
            SortField::Name => "name",
            SortField::UpdatedAt => "updated_at",
        };
        let direction = match page.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };

        let mut query = format!(
            "SELECT id, owner, name, description, kind, schedule_kind, scheduled_time, cron_expression, \
             next_run, payload, timeout AS timeout_secs, max_retries, status, retry_count, created_at, \
             updated_at, last_executed_at FROM jobs WHERE owner = $1 AND status != 'deleted'"
        );
        if filter.status.is_some() {
            query.push_str(" AND status = $2");
        }
        if filter.kind.is_some() {
            query.push_str(if filter.status.is_some() { " AND kind = $3" } else { " AND kind = $2" });
        }
        query.push_str(&format!(" ORDER BY {} {} LIMIT {} OFFSET {}", sort_col, direction, page.limit, page.offset));

        let mut q = sqlx::query_as::<_, Job>(&query).bind(owner);
        if let Some(status) = filter.status {
            q = q.bind(status);
        }
        if let Some(kind) = filter.kind {
            q = q.bind(kind);
        }
        let items = q.fetch_all(&self.pool).await.map_err(JobError::from_sqlx)?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE owner = $1 AND status != 'deleted'")
            .bind(owner)
            .fetch_one(&self.pool)
            .await
            .map_err(JobError::from_sqlx)?;

        Ok(PageResult { items, total })
    }

    async fn update_job(&self, owner: &str, id: JobId, patch: &JobPatch, next_run: Option<DateTime<Utc>>) -> StoreResult<Job> {
        let existing = self
            .get_job(owner, id)
            .await?
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;

        if existing.status.is_terminal() {
            return Err(JobError::ForbiddenTransition(format!(
                "cannot update job in terminal status {}",
                existing.status
            )));
        }

        let name = patch.name.clone().unwrap_or(existing.name);
        let description = patch.description.clone().or(existing.description);
        let payload = patch.payload.clone().unwrap_or(existing.payload);
        let timeout_secs = patch.timeout_secs.unwrap_or(existing.timeout_secs);
        if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&timeout_secs) {
            return Err(JobError::InvalidInput(format!("timeout_secs must be in [{}, {}]", MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS)));
        }
        let cron_expression = patch.cron_expression.clone().or(existing.cron_expression.clone());
        let status = patch.status.unwrap_or(existing.status);
        let next_run = next_run.or(existing.next_run);

        sqlx::query(
            "UPDATE jobs SET name=$1, description=$2, cron_expression=$3, payload=$4, timeout=$5, \
             status=$6, next_run=$7, updated_at=now() WHERE id=$8 AND owner=$9",
        )
        .bind(&name)
        .bind(&description)
        .bind(&cron_expression)
        .bind(&payload)
        .bind(timeout_secs)
        .bind(status)
        .bind(next_run)
        .bind(id)
        .bind(owner)
        .execute(&self.pool)
        .await
        .map_err(JobError::from_sqlx)?;

        self.get_job(owner, id).await?.ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    async fn soft_delete_job(&self, owner: &str, id: JobId) -> StoreResult<()> {
        sqlx::query("UPDATE jobs SET status='deleted', next_run=NULL, updated_at=now() WHERE id=$1 AND owner=$2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await
            .map_err(JobError::from_sqlx)?;
        Ok(())
    }

    async fn set_status(&self, owner: &str, id: JobId, status: JobStatus, next_run: Option<DateTime<Utc>>) -> StoreResult<Job> {
        sqlx::query("UPDATE jobs SET status=$1, next_run=$2, updated_at=now() WHERE id=$3 AND owner=$4")
            .bind(status)
            .bind(next_run)
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await
            .map_err(JobError::from_sqlx)?;
        self.get_job(owner, id).await?.ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    async fn claim_due_jobs(&self, limit: i64, horizon: DateTime<Utc>) -> StoreResult<Vec<Job>> {
        sqlx::query_as::<_, Job>(
            "SELECT id, owner, name, description, kind, schedule_kind, scheduled_time, cron_expression, \
             next_run, payload, timeout AS timeout_secs, max_retries, status, retry_count, created_at, \
             updated_at, last_executed_at FROM jobs WHERE status = 'active' AND next_run <= $1 \
             ORDER BY next_run ASC LIMIT $2",
        )
        .bind(horizon)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(JobError::from_sqlx)
    }

    async fn upcoming_jobs(&self, owner: &str, horizon: DateTime<Utc>) -> StoreResult<Vec<Job>> {
        sqlx::query_as::<_, Job>(
            "SELECT id, owner, name, description, kind, schedule_kind, scheduled_time, cron_expression, \
             next_run, payload, timeout AS timeout_secs, max_retries, status, retry_count, created_at, \
             updated_at, last_executed_at FROM jobs WHERE owner = $1 AND status = 'active' AND next_run <= $2 \
             ORDER BY next_run ASC",
        )
        .bind(owner)
        .bind(horizon)
        .fetch_all(&self.pool)
        .await
        .map_err(JobError::from_sqlx)
    }

    async fn begin_execution(&self, job_id: JobId, retry_attempt: i32) -> StoreResult<Execution> {
        let execution = Execution {
            id: Uuid::new_v4(),
            job_id,
            started_at: Utc::now(),
            finished_at: None,
            status: ExecutionStatus::Running,
            retry_attempt,
            duration_ms: None,
            error_message: None,
            output: None,
        };
        sqlx::query(
            "INSERT INTO executions (id, job_id, started_at, status, retry_attempt) VALUES ($1,$2,$3,$4,$5)",
        )
        .bind(execution.id)
        .bind(execution.job_id)
        .bind(execution.started_at)
        .bind(execution.status)
        .bind(execution.retry_attempt)
        .execute(&self.pool)
        .await
        .map_err(JobError::from_sqlx)?;
        Ok(execution)
    }

    async fn finalize_execution(&self, execution_id: ExecutionId, outcome: &ExecutionOutcome) -> StoreResult<Execution> {
        let finished_at = Utc::now();
        let status = outcome.status();
        let (error_message, output) = match outcome {
            ExecutionOutcome::Success { output } => (None, output.clone()),
            ExecutionOutcome::Timeout { message } => (Some(message.clone()), None),
            ExecutionOutcome::Failure { message } => (Some(message.clone()), None),
        };

        let row = sqlx::query_as::<_, Execution>(
            "UPDATE executions SET finished_at=$1, status=$2, error_message=$3, output=$4, \
             duration_ms = EXTRACT(EPOCH FROM ($1 - started_at)) * 1000 \
             WHERE id=$5 RETURNING id, job_id, started_at, finished_at, status, retry_attempt, \
             duration_ms, error_message, output",
        )
        .bind(finished_at)
        .bind(status)
        .bind(&error_message)
        .bind(&output)
        .bind(execution_id)
        .fetch_one(&self.pool)
        .await
        .map_err(JobError::from_sqlx)?;

        Ok(row)
    }

    async fn set_next_run(&self, job_id: JobId, next_run: Option<DateTime<Utc>>) -> StoreResult<()> {
        sqlx::query("UPDATE jobs SET next_run=$1, updated_at=now() WHERE id=$2")
            .bind(next_run)
            .bind(job_id)
            .execute(&self.pool)
            .await
            .map_err(JobError::from_sqlx)?;
        Ok(())
    }

    async fn mark_last_executed(&self, job_id: JobId, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query("UPDATE jobs SET last_executed_at=$1, updated_at=now() WHERE id=$2")
            .bind(at)
            .bind(job_id)
            .execute(&self.pool)
            .await
            .map_err(JobError::from_sqlx)?;
        Ok(())
    }

    async fn mark_completed(&self, job_id: JobId) -> StoreResult<()> {
        sqlx::query("UPDATE jobs SET status='completed', next_run=NULL, updated_at=now() WHERE id=$1")
            .bind(job_id)
            .execute(&self.pool)
            .await
            .map_err(JobError::from_sqlx)?;
        Ok(())
    }

    async fn increment_retry_count(&self, job_id: JobId) -> StoreResult<()> {
        sqlx::query("UPDATE jobs SET retry_count = retry_count + 1, updated_at=now() WHERE id=$1")
            .bind(job_id)
            .execute(&self.pool)
            .await
            .map_err(JobError::from_sqlx)?;
        Ok(())
    }

    async fn reset_retry_count(&self, job_id: JobId) -> StoreResult<()> {
        sqlx::query("UPDATE jobs SET retry_count = 0, updated_at=now() WHERE id=$1")
            .bind(job_id)
            .execute(&self.pool)
            .await
            .map_err(JobError::from_sqlx)?;
        Ok(())
    }

    async fn append_log(&self, execution_id: ExecutionId, level: LogLevel, message: &str, metadata: Option<serde_json::Value>) -> StoreResult<ExecutionLog> {
        let log = ExecutionLog {
            id: Uuid::new_v4(),
            execution_id,
            level,
            message: message.to_string(),
            timestamp: Utc::now(),
            metadata,
        };
        sqlx::query("INSERT INTO logs (id, execution_id, level, message, timestamp, metadata) VALUES ($1,$2,$3,$4,$5,$6)")
            .bind(log.id)
            .bind(log.execution_id)
            .bind(log.level)
            .bind(&log.message)
            .bind(log.timestamp)
            .bind(&log.metadata)
            .execute(&self.pool)
            .await
            .map_err(JobError::from_sqlx)?;
        Ok(log)
    }

    async fn get_executions(&self, owner: &str, job_id: JobId, page: &Page) -> StoreResult<PageResult<Execution>> {
        if self.get_job(owner, job_id).await?.is_none() {
            return Err(JobError::NotFound(job_id.to_string()));
        }
        let items = sqlx::query_as::<_, Execution>(
            "SELECT id, job_id, started_at, finished_at, status, retry_attempt, duration_ms, \
             error_message, output FROM executions WHERE job_id = $1 ORDER BY started_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(job_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(JobError::from_sqlx)?;
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM executions WHERE job_id = $1")
            .bind(job_id)
            .fetch_one(&self.pool)
            .await
            .map_err(JobError::from_sqlx)?;
        Ok(PageResult { items, total })
    }

    async fn get_execution(&self, owner: &str, execution_id: ExecutionId) -> StoreResult<Option<Execution>> {
        let row = sqlx::query_as::<_, Execution>(
            "SELECT e.id, e.job_id, e.started_at, e.finished_at, e.status, e.retry_attempt, \
             e.duration_ms, e.error_message, e.output FROM executions e \
             JOIN jobs j ON j.id = e.job_id WHERE e.id = $1 AND j.owner = $2",
        )
        .bind(execution_id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await
        .map_err(JobError::from_sqlx)?;
        Ok(row)
    }

    async fn get_execution_logs(&self, owner: &str, execution_id: ExecutionId) -> StoreResult<Vec<ExecutionLog>> {
        if self.get_execution(owner, execution_id).await?.is_none() {
            return Err(JobError::NotFound(execution_id.to_string()));
        }
        sqlx::query_as::<_, ExecutionLog>(
            "SELECT id, execution_id, level, message, timestamp, metadata FROM logs \
             WHERE execution_id = $1 ORDER BY timestamp ASC",
        )
        .bind(execution_id)
        .fetch_all(&self.pool)
        .await
        .map_err(JobError::from_sqlx)
    }
}

/// In-memory store for fast, dependency-free tests of scheduling logic.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<JobId, Job>>,
    executions: Mutex<HashMap<ExecutionId, Execution>>,
    logs: Mutex<Vec<ExecutionLog>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStoreBackend for InMemoryJobStore {
    async fn create_job(&self, owner: &str, new_job: &NewJob, next_run: Option<DateTime<Utc>>) -> StoreResult<Job> {
        validate_new_job(new_job)?;
        let now = Utc::now();
        let mut job = Job {
            id: Uuid::new_v4(),
            owner: owner.to_string(),
            name: new_job.name.clone(),
            description: new_job.description.clone(),
            kind: new_job.kind,
            schedule_kind: String::new(),
            scheduled_time: None,
            cron_expression: None,
            next_run,
            payload: new_job.payload.clone(),
            timeout_secs: new_job.timeout_secs.unwrap_or(300),
            max_retries: new_job.max_retries.unwrap_or(3),
            status: JobStatus::Active,
            retry_count: 0,
            created_at: now,
            updated_at: now,
            last_executed_at: None,
        };
        job.set_schedule(&new_job.schedule);
        self.jobs.lock().unwrap().insert(job.id, job.clone());
        Ok(job)
    }

    async fn get_job(&self, owner: &str, id: JobId) -> StoreResult<Option<Job>> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .get(&id)
            .filter(|j| j.owner == owner && j.status != JobStatus::Deleted)
            .cloned())
    }

    async fn get_job_by_id(&self, id: JobId) -> StoreResult<Option<Job>> {
        Ok(self.jobs.lock().unwrap().get(&id).filter(|j| j.status != JobStatus::Deleted).cloned())
    }

    async fn fail_job(&self, id: JobId) -> StoreResult<()> {
        if let Some(job) = self.jobs.lock().unwrap().get_mut(&id) {
            job.status = JobStatus::Failed;
            job.next_run = None;
            job.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn list_jobs(&self, owner: &str, filter: &JobFilter, page: &Page) -> StoreResult<PageResult<Job>> {
        let jobs = self.jobs.lock().unwrap();
        let mut items: Vec<Job> = jobs
            .values()
            .filter(|j| j.owner == owner && j.status != JobStatus::Deleted)
            .filter(|j| filter.status.map_or(true, |s| j.status == s))
            .filter(|j| filter.kind.map_or(true, |k| j.kind == k))
            .cloned()
            .collect();
        items.sort_by(|a, b| match page.sort {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::NextRun => a.next_run.cmp(&b.next_run),
            SortField::Name => a.name.cmp(&b.name),
            SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        });
        if page.direction == SortDirection::Desc {
            items.reverse();
        }
        let total = items.len() as i64;
        let items = items
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect();
        Ok(PageResult { items, total })
    }

    async fn update_job(&self, owner: &str, id: JobId, patch: &JobPatch, next_run: Option<DateTime<Utc>>) -> StoreResult<Job> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&id)
            .filter(|j| j.owner == owner)
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;
        if job.status.is_terminal() {
            return Err(JobError::ForbiddenTransition(format!("cannot update job in terminal status {}", job.status)));
        }
        if let Some(name) = &patch.name {
            job.name = name.clone();
        }
        if let Some(description) = &patch.description {
            job.description = Some(description.clone());
        }
        if let Some(cron_expression) = &patch.cron_expression {
            job.cron_expression = Some(cron_expression.clone());
            job.schedule_kind = "cron".to_string();
        }
        if let Some(payload) = &patch.payload {
            job.payload = payload.clone();
        }
        if let Some(timeout_secs) = patch.timeout_secs {
            if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&timeout_secs) {
                return Err(JobError::InvalidInput(format!("timeout_secs must be in [{}, {}]", MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS)));
            }
            job.timeout_secs = timeout_secs;
        }
        if let Some(status) = patch.status {
            job.status = status;
        }
        if let Some(next_run) = next_run {
            job.next_run = Some(next_run);
        }
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    async fn soft_delete_job(&self, owner: &str, id: JobId) -> StoreResult<()> {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.get_mut(&id).filter(|j| j.owner == owner) {
            job.status = JobStatus::Deleted;
            job.next_run = None;
            job.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_status(&self, owner: &str, id: JobId, status: JobStatus, next_run: Option<DateTime<Utc>>) -> StoreResult<Job> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(&id)
            .filter(|j| j.owner == owner)
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;
        job.status = status;
        job.next_run = next_run;
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    async fn claim_due_jobs(&self, limit: i64, horizon: DateTime<Utc>) -> StoreResult<Vec<Job>> {
        let jobs = self.jobs.lock().unwrap();
        let mut due: Vec<Job> = jobs
            .values()
            .filter(|j| j.status == JobStatus::Active && j.next_run.map_or(false, |nr| nr <= horizon))
            .cloned()
            .collect();
        due.sort_by_key(|j| j.next_run);
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn upcoming_jobs(&self, owner: &str, horizon: DateTime<Utc>) -> StoreResult<Vec<Job>> {
        let jobs = self.jobs.lock().unwrap();
        let mut upcoming: Vec<Job> = jobs
            .values()
            .filter(|j| j.owner == owner && j.status == JobStatus::Active && j.next_run.map_or(false, |nr| nr <= horizon))
            .cloned()
            .collect();
        upcoming.sort_by_key(|j| j.next_run);
        Ok(upcoming)
    }

    async fn begin_execution(&self, job_id: JobId, retry_attempt: i32) -> StoreResult<Execution> {
        let execution = Execution {
            id: Uuid::new_v4(),
            job_id,
            started_at: Utc::now(),
            finished_at: None,
            status: ExecutionStatus::Running,
            retry_attempt,
            duration_ms: None,
            error_message: None,
            output: None,
        };
        self.executions.lock().unwrap().insert(execution.id, execution.clone());
        Ok(execution)
    }

    async fn finalize_execution(&self, execution_id: ExecutionId, outcome: &ExecutionOutcome) -> StoreResult<Execution> {
        let mut executions = self.executions.lock().unwrap();
        let execution = executions
            .get_mut(&execution_id)
            .ok_or_else(|| JobError::NotFound(execution_id.to_string()))?;
        let finished_at = Utc::now();
        execution.finished_at = Some(finished_at);
        execution.status = outcome.status();
        execution.duration_ms = Some((finished_at - execution.started_at).num_milliseconds());
        match outcome {
            ExecutionOutcome::Success { output } => execution.output = output.clone(),
            ExecutionOutcome::Timeout { message } | ExecutionOutcome::Failure { message } => {
                execution.error_message = Some(message.clone())
            }
        }
        Ok(execution.clone())
    }

    async fn set_next_run(&self, job_id: JobId, next_run: Option<DateTime<Utc>>) -> StoreResult<()> {
        if let Some(job) = self.jobs.lock().unwrap().get_mut(&job_id) {
            job.next_run = next_run;
            job.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_last_executed(&self, job_id: JobId, at: DateTime<Utc>) -> StoreResult<()> {
        if let Some(job) = self.jobs.lock().unwrap().get_mut(&job_id) {
            job.last_executed_at = Some(at);
            job.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_completed(&self, job_id: JobId) -> StoreResult<()> {
        if let Some(job) = self.jobs.lock().unwrap().get_mut(&job_id) {
            job.status = JobStatus::Completed;
            job.next_run = None;
            job.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn increment_retry_count(&self, job_id: JobId) -> StoreResult<()> {
        if let Some(job) = self.jobs.lock().unwrap().get_mut(&job_id) {
            job.retry_count += 1;
        }
        Ok(())
    }

    async fn reset_retry_count(&self, job_id: JobId) -> StoreResult<()> {
        if let Some(job) = self.jobs.lock().unwrap().get_mut(&job_id) {
            job.retry_count = 0;
        }
        Ok(())
    }

    async fn append_log(&self, execution_id: ExecutionId, level: LogLevel, message: &str, metadata: Option<serde_json::Value>) -> StoreResult<ExecutionLog> {
        let log = ExecutionLog {
            id: Uuid::new_v4(),
            execution_id,
            level,
            message: message.to_string(),
            timestamp: Utc::now(),
            metadata,
        };
        self.logs.lock().unwrap().push(log.clone());
        Ok(log)
    }

    async fn get_executions(&self, _owner: &str, job_id: JobId, page: &Page) -> StoreResult<PageResult<Execution>> {
        let executions = self.executions.lock().unwrap();
        let mut items: Vec<Execution> = executions.values().filter(|e| e.job_id == job_id).cloned().collect();
        items.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        let total = items.len() as i64;
        let items = items.into_iter().skip(page.offset as usize).take(page.limit as usize).collect();
        Ok(PageResult { items, total })
    }

    async fn get_execution(&self, _owner: &str, execution_id: ExecutionId) -> StoreResult<Option<Execution>> {
        Ok(self.executions.lock().unwrap().get(&execution_id).cloned())
    }

    async fn get_execution_logs(&self, _owner: &str, execution_id: ExecutionId) -> StoreResult<Vec<ExecutionLog>> {
        Ok(self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.execution_id == execution_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_job() -> NewJob {
        NewJob {
            name: "nightly-report".into(),
            description: None,
            kind: JobKind::OneTime,
            schedule: Schedule::Immediate,
            payload: serde_json::json!({"k": 1}),
            timeout_secs: None,
            max_retries: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_job() {
        let store = InMemoryJobStore::new();
        let job = store.create_job("tenant-1", &new_job(), Some(Utc::now())).await.unwrap();
        let fetched = store.get_job("tenant-1", job.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "nightly-report");
        assert_eq!(fetched.status, JobStatus::Active);
    }

    #[tokio::test]
    async fn test_soft_delete_excluded_from_list_and_get() {
        let store = InMemoryJobStore::new();
        let job = store.create_job("tenant-1", &new_job(), Some(Utc::now())).await.unwrap();
        store.soft_delete_job("tenant-1", job.id).await.unwrap();

        assert!(store.get_job("tenant-1", job.id).await.unwrap().is_none());
        let page = store.list_jobs("tenant-1", &JobFilter::default(), &Page::default()).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_update_rejects_terminal_job() {
        let store = InMemoryJobStore::new();
        let job = store.create_job("tenant-1", &new_job(), Some(Utc::now())).await.unwrap();
        store.mark_completed(job.id).await.unwrap();

        let result = store.update_job("tenant-1", job.id, &JobPatch { name: Some("x".into()), ..Default::default() }, None).await;
        assert!(matches!(result, Err(JobError::ForbiddenTransition(_))));
    }

    #[tokio::test]
    async fn test_claim_due_jobs_respects_horizon_and_status() {
        let store = InMemoryJobStore::new();
        let now = Utc::now();
        let due = store.create_job("tenant-1", &new_job(), Some(now - chrono::Duration::seconds(5))).await.unwrap();
        let future = store.create_job("tenant-1", &new_job(), Some(now + chrono::Duration::hours(1))).await.unwrap();

        let claimed = store.claim_due_jobs(1000, now).await.unwrap();
        let ids: Vec<_> = claimed.iter().map(|j| j.id).collect();
        assert!(ids.contains(&due.id));
        assert!(!ids.contains(&future.id));
    }

    #[tokio::test]
    async fn test_execution_lifecycle() {
        let store = InMemoryJobStore::new();
        let job = store.create_job("tenant-1", &new_job(), Some(Utc::now())).await.unwrap();
        let execution = store.begin_execution(job.id, 0).await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Running);

        let finalized = store
            .finalize_execution(execution.id, &ExecutionOutcome::Success { output: None })
            .await
            .unwrap();
        assert_eq!(finalized.status, ExecutionStatus::Success);
        assert!(finalized.finished_at.is_some());
    }
}
