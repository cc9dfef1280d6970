//! Scheduler: job lifecycle, initial enqueue/cancel, and Safety Sync
//!
//! The scheduler is the only component that knows both the job store and
//! the dispatch queue; it is the facade the control surface calls into.
//! Recurring jobs are re-enqueued by the executor calling back through the
//! narrow [`Rescheduler`] trait implemented here, which keeps the executor
//! from depending on the full scheduler type.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use super::clock::Clock;
use super::cron::CronEvaluator;
use super::job::*;
use super::metrics::SchedulerMetrics;
use super::queue::DispatchQueueBackend;
use super::store::JobStoreBackend;
use super::{JobError, JobProcessingResult, Rescheduler};
use crate::jobs::config::SchedulerConfig;

const MANUAL_TRIGGER_PRIORITY: i32 = 1;
const SAFETY_SYNC_PRIORITY: i32 = 5;
const INITIAL_ENQUEUE_PRIORITY: i32 = 5;

pub struct Scheduler<S, Q, C = super::clock::SystemClock> {
    store: Arc<S>,
    queue: Arc<Q>,
    clock: Arc<C>,
    cron: CronEvaluator,
    config: SchedulerConfig,
    metrics: Arc<SchedulerMetrics>,
}

impl<S, Q, C> Scheduler<S, Q, C>
where
    S: JobStoreBackend,
    Q: DispatchQueueBackend,
    C: Clock,
{
    pub fn new(store: Arc<S>, queue: Arc<Q>, clock: Arc<C>, config: SchedulerConfig, metrics: Arc<SchedulerMetrics>) -> Self {
        Self { store, queue, clock, cron: CronEvaluator::new(), config, metrics }
    }

    /// Compute the schedule's next fire time, validating it in the process.
    fn resolve_next_run(&self, schedule: &Schedule) -> JobProcessingResult<Option<DateTime<Utc>>> {
        let now = self.clock.now();
        match schedule {
            Schedule::Immediate => Ok(Some(now)),
            Schedule::At { at } => {
                if *at <= now {
                    return Err(JobError::ScheduledTimeInPast(at.to_rfc3339()));
                }
                Ok(Some(*at))
            }
            Schedule::Cron { expression } => {
                self.cron.validate(expression)?;
                Ok(Some(self.cron.next(expression, now)?))
            }
        }
    }

    pub async fn create_job(&self, owner: &str, new_job: NewJob) -> JobProcessingResult<Job> {
        let next_run = self.resolve_next_run(&new_job.schedule)?;
        let job = self.store.create_job(owner, &new_job, next_run).await?;
        self.enqueue_initial(&job).await?;
        Ok(job)
    }

    async fn enqueue_initial(&self, job: &Job) -> JobProcessingResult<()> {
        let Some(next_run) = job.next_run else { return Ok(()) };
        let delay = next_run - self.clock.now();
        let delay = if delay > chrono::Duration::zero() { delay } else { chrono::Duration::zero() };
        self.queue
            .enqueue(job.id, job.payload.clone(), delay, INITIAL_ENQUEUE_PRIORITY)
            .await
    }

    pub async fn get_job(&self, owner: &str, id: JobId) -> JobProcessingResult<Job> {
        self.store.get_job(owner, id).await?.ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    pub async fn list_jobs(&self, owner: &str, filter: &JobFilter, page: &Page) -> JobProcessingResult<PageResult<Job>> {
        self.store.list_jobs(owner, filter, page).await
    }

    pub async fn update_job(&self, owner: &str, id: JobId, patch: JobPatch) -> JobProcessingResult<Job> {
        let next_run = if let Some(expr) = &patch.cron_expression {
            self.cron.validate(expr)?;
            Some(self.cron.next(expr, self.clock.now())?)
        } else {
            None
        };

        let job = self.store.update_job(owner, id, &patch, next_run).await?;
        if next_run.is_some() {
            self.queue.remove(job.id).await?;
            self.enqueue_initial(&job).await?;
        }
        Ok(job)
    }

    pub async fn delete_job(&self, owner: &str, id: JobId) -> JobProcessingResult<()> {
        self.store.soft_delete_job(owner, id).await?;
        self.queue.remove(id).await
    }

    pub async fn pause_job(&self, owner: &str, id: JobId) -> JobProcessingResult<Job> {
        let job = self.store.set_status(owner, id, JobStatus::Paused, None).await?;
        self.queue.remove(id).await?;
        Ok(job)
    }

    pub async fn resume_job(&self, owner: &str, id: JobId) -> JobProcessingResult<Job> {
        let existing = self.get_job(owner, id).await?;
        let next_run = self.resolve_next_run(&existing.schedule())?;
        let job = self.store.set_status(owner, id, JobStatus::Active, next_run).await?;
        self.enqueue_initial(&job).await?;
        Ok(job)
    }

    /// Manual trigger. Shares the dispatch key with the job's normal
    /// schedule, so triggering a job that is already in flight is a no-op:
    /// the existing in-flight delivery is left untouched.
    pub async fn trigger_job(&self, owner: &str, id: JobId) -> JobProcessingResult<()> {
        let job = self.get_job(owner, id).await?;
        self.queue
            .enqueue(job.id, job.payload.clone(), chrono::Duration::zero(), MANUAL_TRIGGER_PRIORITY)
            .await
    }

    pub async fn upcoming_jobs(&self, owner: &str, horizon: DateTime<Utc>) -> JobProcessingResult<Vec<Job>> {
        self.store.upcoming_jobs(owner, horizon).await
    }

    pub async fn get_executions(&self, owner: &str, job_id: JobId, page: &Page) -> JobProcessingResult<PageResult<Execution>> {
        self.store.get_executions(owner, job_id, page).await
    }

    pub async fn get_execution(&self, owner: &str, execution_id: ExecutionId) -> JobProcessingResult<Execution> {
        self.store
            .get_execution(owner, execution_id)
            .await?
            .ok_or_else(|| JobError::NotFound(execution_id.to_string()))
    }

    pub async fn get_execution_logs(&self, owner: &str, execution_id: ExecutionId) -> JobProcessingResult<Vec<ExecutionLog>> {
        self.store.get_execution_logs(owner, execution_id).await
    }

    /// Reconcile the store against the queue: any active job whose
    /// `next_run` has already passed gets re-enqueued. Covers jobs the
    /// queue lost (crash, eviction, operator error) without requiring
    /// exactly-once delivery from the queue itself — `enqueue` is
    /// idempotent by job id, so running this on a job already in the queue
    /// is harmless.
    pub async fn run_safety_sync(&self) -> JobProcessingResult<()> {
        let start = self.clock.now();
        let due = self.store.claim_due_jobs(self.config.safety_sync_limit, start).await?;

        let missed_jobs_found = due.len() as u64;
        let mut added_to_queue = 0u64;
        let mut failed_to_enqueue = 0u64;

        for job in &due {
            match self.queue.enqueue(job.id, job.payload.clone(), chrono::Duration::zero(), SAFETY_SYNC_PRIORITY).await {
                Ok(()) => added_to_queue += 1,
                Err(err) => {
                    failed_to_enqueue += 1;
                    warn!(job_id = %job.id, error = %err, "safety_sync failed to enqueue job");
                }
            }
        }

        let duration_ms = (self.clock.now() - start).num_milliseconds().max(0) as u64;
        self.metrics.record_safety_sync(missed_jobs_found, added_to_queue, failed_to_enqueue, duration_ms);

        if missed_jobs_found > 0 {
            info!(missed_jobs_found, added_to_queue, failed_to_enqueue, duration_ms, "safety_sync reconciled overdue jobs");
        }
        Ok(())
    }

    /// Run Safety Sync on `config.safety_sync_interval`, forever. Intended
    /// to be spawned as a background task by the embedding binary.
    pub async fn run_safety_sync_loop(self: Arc<Self>) {
        if !self.config.enabled {
            return;
        }
        let mut ticker = tokio::time::interval(self.config.safety_sync_interval());
        loop {
            ticker.tick().await;
            if let Err(err) = self.run_safety_sync().await {
                warn!(error = %err, "safety_sync pass failed");
            }
        }
    }
}

#[async_trait::async_trait]
impl<S, Q, C> Rescheduler for Scheduler<S, Q, C>
where
    S: JobStoreBackend,
    Q: DispatchQueueBackend,
    C: Clock,
{
    async fn reschedule(&self, job: &Job) -> JobProcessingResult<()> {
        if !job.is_recurring() {
            return Ok(());
        }
        let next_run = self.resolve_next_run(&job.schedule())?;
        self.store.set_next_run(job.id, next_run).await?;

        if let Some(next_run) = next_run {
            let delay = next_run - self.clock.now();
            let delay = if delay > chrono::Duration::zero() { delay } else { chrono::Duration::zero() };
            self.queue.enqueue(job.id, job.payload.clone(), delay, INITIAL_ENQUEUE_PRIORITY).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::clock::FixedClock;
    use crate::jobs::queue::InMemoryDispatchQueue;
    use crate::jobs::store::InMemoryJobStore;
    use chrono::TimeZone;

    fn scheduler(now: DateTime<Utc>) -> Scheduler<InMemoryJobStore, InMemoryDispatchQueue, FixedClock> {
        Scheduler::new(
            Arc::new(InMemoryJobStore::new()),
            Arc::new(InMemoryDispatchQueue::new()),
            Arc::new(FixedClock::new(now)),
            SchedulerConfig::default(),
            Arc::new(SchedulerMetrics::new()),
        )
    }

    fn new_job(schedule: Schedule, kind: JobKind) -> NewJob {
        NewJob {
            name: "nightly-report".into(),
            description: None,
            kind,
            schedule,
            payload: serde_json::json!({}),
            timeout_secs: None,
            max_retries: None,
        }
    }

    #[tokio::test]
    async fn test_create_job_rejects_scheduled_time_in_past() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let scheduler = scheduler(now);
        let result = scheduler
            .create_job("tenant-1", new_job(Schedule::At { at: now - chrono::Duration::hours(1) }, JobKind::OneTime))
            .await;
        assert!(matches!(result, Err(JobError::ScheduledTimeInPast(_))));
    }

    #[tokio::test]
    async fn test_create_job_enqueues_immediately() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let scheduler = scheduler(now);
        let job = scheduler.create_job("tenant-1", new_job(Schedule::Immediate, JobKind::OneTime)).await.unwrap();

        let dequeued = scheduler.queue.dequeue().await.unwrap().unwrap();
        assert_eq!(dequeued.job_id, job.id);
    }

    #[tokio::test]
    async fn test_pause_removes_from_queue_resume_reenqueues() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let scheduler = scheduler(now);
        let job = scheduler
            .create_job("tenant-1", new_job(Schedule::Cron { expression: "*/5 * * * *".into() }, JobKind::Recurring))
            .await
            .unwrap();

        scheduler.pause_job("tenant-1", job.id).await.unwrap();
        assert!(scheduler.queue.dequeue().await.unwrap().is_none());

        let resumed = scheduler.resume_job("tenant-1", job.id).await.unwrap();
        assert_eq!(resumed.status, JobStatus::Active);
    }

    #[tokio::test]
    async fn test_trigger_is_idempotent_with_pending_run() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let scheduler = scheduler(now);
        let job = scheduler.create_job("tenant-1", new_job(Schedule::Immediate, JobKind::OneTime)).await.unwrap();

        scheduler.trigger_job("tenant-1", job.id).await.unwrap();
        assert_eq!(scheduler.queue.stats().await.unwrap().pending, 1);
    }

    #[tokio::test]
    async fn test_safety_sync_reenqueues_overdue_active_job() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let scheduler = scheduler(now);
        let job = scheduler.create_job("tenant-1", new_job(Schedule::Immediate, JobKind::OneTime)).await.unwrap();
        scheduler.queue.dequeue().await.unwrap();

        scheduler.run_safety_sync().await.unwrap();
        let dequeued = scheduler.queue.dequeue().await.unwrap().unwrap();
        assert_eq!(dequeued.job_id, job.id);
        assert_eq!(scheduler.metrics.snapshot().missed_jobs_found, 1);
    }

    #[tokio::test]
    async fn test_rescheduler_advances_recurring_job() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 2, 30).unwrap();
        let scheduler = scheduler(now);
        let job = scheduler
            .create_job("tenant-1", new_job(Schedule::Cron { expression: "*/5 * * * *".into() }, JobKind::Recurring))
            .await
            .unwrap();

        Rescheduler::reschedule(&scheduler, &job).await.unwrap();
        let updated = scheduler.get_job("tenant-1", job.id).await.unwrap();
        assert_eq!(updated.next_run, Some(Utc.with_ymd_and_hms(2026, 1, 1, 12, 5, 0).unwrap()));
    }
}
