//! Executor: dequeues dispatch items and runs job logic under a timeout
//!
//! Lifecycle per delivered item:
//! 1. load the authoritative job row; if it's gone, drop the item
//! 2. check the job is active (or the item carries a manual-trigger priority)
//! 3. begin an execution record
//! 4. log that execution started
//! 5. run the job logic bounded by the job's timeout
//! 6. finalize the execution with the outcome (success/timeout/failure)
//! 7. on a terminal failure, notify and mark the job failed; on success of a
//!    recurring job, hand off to the `Rescheduler` to queue the next run

use std::sync::Arc;
use tokio::sync::{RwLock, Semaphore};
use tokio::time::{sleep, Duration};
use tracing::{error, info};
use uuid::Uuid;

use super::config::WorkerConfig;
use super::dead_letter::{DeadLetterEntry, DeadLetterSink};
use super::job::{ExecutionOutcome, Job, JobStatus, LogLevel};
use super::metrics::SchedulerMetrics;
use super::notify::{JobFailureNotification, NotificationSink};
use super::queue::{DispatchItem, DispatchQueueBackend};
use super::retry::ExponentialBackoff;
use super::store::JobStoreBackend;
use super::{JobLogic, JobProcessingResult, Rescheduler};

pub type ExecutorId = Uuid;

const MANUAL_TRIGGER_PRIORITY: i32 = 1;
const EMPTY_QUEUE_BACKOFF: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Starting,
    Running,
    Paused,
    Stopping,
    Stopped,
}

pub struct Executor {
    id: ExecutorId,
    store: Arc<dyn JobStoreBackend>,
    queue: Arc<dyn DispatchQueueBackend>,
    rescheduler: Arc<dyn Rescheduler>,
    logic: Arc<dyn JobLogic>,
    notifier: Arc<dyn NotificationSink>,
    dead_letters: Arc<DeadLetterSink>,
    metrics: Arc<SchedulerMetrics>,
    backoff: ExponentialBackoff,
    state: Arc<RwLock<ExecutorState>>,
    semaphore: Arc<Semaphore>,
    jobs_processed: Arc<std::sync::atomic::AtomicU64>,
}

impl Executor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        worker_config: &WorkerConfig,
        backoff: ExponentialBackoff,
        store: Arc<dyn JobStoreBackend>,
        queue: Arc<dyn DispatchQueueBackend>,
        rescheduler: Arc<dyn Rescheduler>,
        logic: Arc<dyn JobLogic>,
        notifier: Arc<dyn NotificationSink>,
        dead_letters: Arc<DeadLetterSink>,
        metrics: Arc<SchedulerMetrics>,
    ) -> Self {
        Self {
            id: ExecutorId::new_v4(),
            store,
            queue,
            rescheduler,
            logic,
            notifier,
            dead_letters,
            metrics,
            backoff,
            state: Arc::new(RwLock::new(ExecutorState::Starting)),
            semaphore: Arc::new(Semaphore::new(worker_config.concurrency)),
            jobs_processed: Arc::new(std::sync::atomic::AtomicU64::new(0)),
        }
    }

    pub async fn state(&self) -> ExecutorState {
        *self.state.read().await
    }

    pub async fn pause(&self) {
        *self.state.write().await = ExecutorState::Paused;
    }

    pub async fn resume(&self) {
        *self.state.write().await = ExecutorState::Running;
    }

    pub async fn stop(&self) {
        *self.state.write().await = ExecutorState::Stopping;
    }

    pub fn jobs_processed(&self) -> u64 {
        self.jobs_processed.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Run until `stop()` is called. Spawns one bounded task per dequeued
    /// item, limited to `worker_config.concurrency` in flight at once.
    pub async fn run(self: Arc<Self>) {
        *self.state.write().await = ExecutorState::Running;
        info!(executor_id = %self.id, "executor started");

        loop {
            match *self.state.read().await {
                ExecutorState::Stopping | ExecutorState::Stopped => break,
                ExecutorState::Paused => {
                    sleep(EMPTY_QUEUE_BACKOFF).await;
                    continue;
                }
                _ => {}
            }

            match self.queue.dequeue().await {
                Ok(Some(item)) => {
                    let permit = self.semaphore.clone().acquire_owned().await.expect("semaphore closed");
                    let executor = self.clone();
                    tokio::spawn(async move {
                        executor.process_item(item).await;
                        drop(permit);
                    });
                }
                Ok(None) => sleep(EMPTY_QUEUE_BACKOFF).await,
                Err(err) => {
                    error!(executor_id = %self.id, error = %err, "dequeue failed");
                    sleep(Duration::from_secs(1)).await;
                }
            }
        }

        *self.state.write().await = ExecutorState::Stopped;
        info!(executor_id = %self.id, "executor stopped");
    }

    async fn process_item(&self, item: DispatchItem) {
        self.jobs_processed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        let job = match self.store.get_job_by_id(item.job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                info!(job_id = %item.job_id, "skipped: job_gone");
                let _ = self.queue.complete(&item).await;
                return;
            }
            Err(err) => {
                error!(job_id = %item.job_id, error = %err, "failed to load job for execution");
                let _ = self.queue.complete(&item).await;
                return;
            }
        };

        let is_manual = item.priority == MANUAL_TRIGGER_PRIORITY;
        if job.status != JobStatus::Active && !is_manual {
            info!(job_id = %job.id, status = %job.status, "skipped: status mismatch");
            let _ = self.queue.complete(&item).await;
            return;
        }

        if let Err(err) = self.run_execution(&job, &item).await {
            error!(job_id = %job.id, error = %err, "execution bookkeeping failed");
        }
    }

    async fn run_execution(&self, job: &Job, item: &DispatchItem) -> JobProcessingResult<()> {
        let retry_attempt = (item.attempt as i32 - 1).max(0);
        let execution = self.store.begin_execution(job.id, retry_attempt).await?;
        self.store
            .append_log(execution.id, LogLevel::Info, "execution started", None)
            .await?;

        let timeout = Duration::from_secs(job.timeout_secs.max(1) as u64);
        let outcome = match tokio::time::timeout(timeout, self.logic.run(job)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => ExecutionOutcome::Failure { message: err.to_string() },
            Err(_) => ExecutionOutcome::Timeout { message: format!("execution timeout after {} s", job.timeout_secs) },
        };

        let finalized = self.store.finalize_execution(execution.id, &outcome).await?;

        match &outcome {
            ExecutionOutcome::Success { .. } => {
                self.metrics.record_execution_success(finalized.duration_ms.unwrap_or(0));
                self.store.mark_last_executed(job.id, finalized.finished_at.unwrap_or(finalized.started_at)).await?;
                self.store.reset_retry_count(job.id).await?;
                self.queue.complete(item).await?;

                if job.is_recurring() {
                    // re-read: the job may have been paused or deleted while this execution ran
                    if let Some(current) = self.store.get_job_by_id(job.id).await? {
                        if current.status == JobStatus::Active {
                            self.rescheduler.reschedule(&current).await?;
                        }
                    }
                } else {
                    self.store.mark_completed(job.id).await?;
                }
                Ok(())
            }
            ExecutionOutcome::Timeout { message } => {
                self.metrics.record_execution_timeout();
                self.store
                    .append_log(execution.id, LogLevel::Error, message, None)
                    .await?;
                self.handle_attempt_failure(job, item, message.clone()).await
            }
            ExecutionOutcome::Failure { message } => {
                self.metrics.record_execution_failure();
                self.store
                    .append_log(execution.id, LogLevel::Error, message, None)
                    .await?;
                self.handle_attempt_failure(job, item, message.clone()).await
            }
        }
    }

    /// `is_final` is keyed off `job.max_retries`, not this worker's default
    /// backoff cap — each job carries its own retry budget.
    async fn handle_attempt_failure(&self, job: &Job, item: &DispatchItem, message: String) -> JobProcessingResult<()> {
        self.store.increment_retry_count(job.id).await?;
        let job_backoff = ExponentialBackoff::new(self.backoff.base_delay, job.max_retries as u32 + 1);
        let is_final = job_backoff.is_final(item.attempt);

        if !is_final {
            let delay = job_backoff.delay_for(item.attempt + 1).unwrap_or(job_backoff.base_delay);
            self.queue
                .fail(item, false, chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero()))
                .await?;
            return Ok(());
        }

        self.queue.fail(item, true, chrono::Duration::zero()).await?;
        self.store.fail_job(job.id).await?;

        self.dead_letters.push(DeadLetterEntry::new(job, message.clone(), item.attempt));
        self.notifier
            .emit(JobFailureNotification {
                job_id: job.id,
                job_name: job.name.clone(),
                owner: job.owner.clone(),
                error: message,
                attempts: item.attempt,
                timestamp: chrono::Utc::now(),
            })
            .await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::clock::FixedClock;
    use crate::jobs::config::SchedulerConfig;
    use crate::jobs::job::{ExecutionOutcome, JobKind, NewJob, Schedule};
    use crate::jobs::metrics::SchedulerMetrics;
    use crate::jobs::notify::LoggingNotificationSink;
    use crate::jobs::queue::InMemoryDispatchQueue;
    use crate::jobs::scheduler::Scheduler;
    use crate::jobs::store::InMemoryJobStore;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    struct AlwaysSucceeds;
    #[async_trait]
    impl JobLogic for AlwaysSucceeds {
        async fn run(&self, _job: &Job) -> JobProcessingResult<ExecutionOutcome> {
            Ok(ExecutionOutcome::Success { output: None })
        }
    }

    struct AlwaysFails;
    #[async_trait]
    impl JobLogic for AlwaysFails {
        async fn run(&self, _job: &Job) -> JobProcessingResult<ExecutionOutcome> {
            Ok(ExecutionOutcome::Failure { message: "boom".into() })
        }
    }

    fn harness(logic: Arc<dyn JobLogic>) -> (Arc<InMemoryJobStore>, Arc<InMemoryDispatchQueue>, Arc<Scheduler<InMemoryJobStore, InMemoryDispatchQueue, FixedClock>>, Executor) {
        let store = Arc::new(InMemoryJobStore::new());
        let queue = Arc::new(InMemoryDispatchQueue::new());
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()));
        let metrics = Arc::new(SchedulerMetrics::new());
        let scheduler = Arc::new(Scheduler::new(store.clone(), queue.clone(), clock, SchedulerConfig::default(), metrics.clone()));

        let executor = Executor::new(
            &WorkerConfig::default(),
            ExponentialBackoff::new(Duration::from_millis(1), 2),
            store.clone(),
            queue.clone(),
            scheduler.clone(),
            logic,
            Arc::new(LoggingNotificationSink),
            Arc::new(DeadLetterSink::new(10)),
            metrics,
        );
        (store, queue, scheduler, executor)
    }

    fn one_time_job() -> NewJob {
        NewJob {
            name: "report".into(),
            description: None,
            kind: JobKind::OneTime,
            schedule: Schedule::Immediate,
            payload: serde_json::json!({}),
            timeout_secs: None,
            max_retries: None,
        }
    }

    fn one_time_job_with_retries(max_retries: i32) -> NewJob {
        NewJob { max_retries: Some(max_retries), ..one_time_job() }
    }

    #[tokio::test]
    async fn test_successful_one_time_job_marks_completed() {
        let (store, queue, scheduler, executor) = harness(Arc::new(AlwaysSucceeds));
        let job = scheduler.create_job("tenant-1", one_time_job()).await.unwrap();
        let item = queue.dequeue().await.unwrap().unwrap();

        executor.process_item(item).await;

        let stored = store.get_job_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_failed_job_retries_then_goes_to_dead_letter() {
        let (store, queue, scheduler, executor) = harness(Arc::new(AlwaysFails));
        let job = scheduler.create_job("tenant-1", one_time_job_with_retries(1)).await.unwrap();

        // attempt 1: fails, not final (job.max_retries=1), requeued
        let item = queue.dequeue().await.unwrap().unwrap();
        executor.process_item(item).await;
        let stored = store.get_job_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Active);

        // attempt 2: fails, final, job marked failed
        tokio::time::sleep(Duration::from_millis(5)).await;
        let retried = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(retried.attempt, 2);
        executor.process_item(retried).await;

        let stored = store.get_job_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(executor.dead_letters.len(), 1);
    }

    #[tokio::test]
    async fn test_job_gone_drops_item_without_panic() {
        let (_store, queue, _scheduler, executor) = harness(Arc::new(AlwaysSucceeds));
        let item = DispatchItem {
            job_id: Uuid::new_v4(),
            payload: serde_json::json!({}),
            attempt: 1,
            priority: 5,
            available_at: Utc::now(),
        };
        executor.process_item(item).await;
        assert_eq!(queue.stats().await.unwrap().pending, 0);
    }
}
