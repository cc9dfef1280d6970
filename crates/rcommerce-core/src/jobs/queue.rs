//! Durable, idempotent dispatch queue backed by Redis
//!
//! The queue is keyed by `job_id`: re-enqueuing a job that is already
//! present only updates its due time, it never creates a second entry. This
//! is what lets the scheduler's Safety Sync call `enqueue` on every overdue
//! job on every pass without producing duplicate deliveries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use uuid::Uuid;

use crate::cache::RedisPool;
use crate::jobs::job::JobId;
use crate::jobs::JobError;

pub type QueueResult<T> = Result<T, JobError>;

/// A payload envelope in flight through the dispatch queue.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DispatchItem {
    pub job_id: JobId,
    pub payload: serde_json::Value,
    pub attempt: u32,
    pub priority: i32,
    pub available_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone)]
pub struct QueueStats {
    pub pending: usize,
    pub in_flight: usize,
}

#[async_trait]
pub trait DispatchQueueBackend: Send + Sync {
    /// Idempotent by `job_id`: a second call before the first is dequeued
    /// replaces the due time and payload instead of adding a second entry.
    async fn enqueue(&self, job_id: JobId, payload: serde_json::Value, delay: chrono::Duration, priority: i32) -> QueueResult<()>;

    /// Drop a pending entry, e.g. when a job is cancelled or deleted.
    async fn remove(&self, job_id: JobId) -> QueueResult<()>;

    /// Pop the earliest due item, if any, and mark it in-flight.
    async fn dequeue(&self) -> QueueResult<Option<DispatchItem>>;

    /// Acknowledge successful delivery; drops the in-flight marker.
    async fn complete(&self, item: &DispatchItem) -> QueueResult<()>;

    /// Acknowledge a failed delivery. Re-enqueues with backoff unless
    /// `is_final`, in which case the item is dropped from the queue
    /// entirely (the caller is responsible for recording it to a
    /// dead-letter sink).
    async fn fail(&self, item: &DispatchItem, is_final: bool, retry_delay: chrono::Duration) -> QueueResult<()>;

    async fn stats(&self) -> QueueResult<QueueStats>;
}

/// Redis-backed dispatch queue. A sorted set keyed by due time holds
/// pending job ids; a hash holds each job id's current payload/attempt.
pub struct RedisDispatchQueue {
    pool: RedisPool,
    namespace: String,
}

impl RedisDispatchQueue {
    pub fn new(pool: RedisPool, namespace: impl Into<String>) -> Self {
        Self { pool, namespace: namespace.into() }
    }

    fn due_set_key(&self) -> String {
        format!("{}/due", self.namespace)
    }

    fn in_flight_set_key(&self) -> String {
        format!("{}/in_flight", self.namespace)
    }

    fn item_key(&self, job_id: JobId) -> String {
        format!("{}/item:{}", self.namespace, job_id)
    }
}

#[async_trait]
impl DispatchQueueBackend for RedisDispatchQueue {
    async fn enqueue(&self, job_id: JobId, payload: serde_json::Value, delay: chrono::Duration, priority: i32) -> QueueResult<()> {
        let mut conn = self.pool.get().await.map_err(JobError::from)?;

        let available_at = Utc::now() + delay;
        let item = DispatchItem { job_id, payload, attempt: 1, priority, available_at };
        let data = serde_json::to_vec(&item).map_err(|e| JobError::Serialization(e.to_string()))?;

        conn.setex(&self.item_key(job_id), 7 * 24 * 3600, &data).await.map_err(JobError::from)?;

        let mut cmd = redis::Cmd::new();
        cmd.arg("ZADD").arg(self.due_set_key()).arg(available_at.timestamp_millis()).arg(job_id.to_string());
        conn.execute(cmd).await.map_err(JobError::from)?;

        let mut remove_in_flight = redis::Cmd::new();
        remove_in_flight.arg("SREM").arg(self.in_flight_set_key()).arg(job_id.to_string());
        conn.execute(remove_in_flight).await.map_err(JobError::from)?;

        Ok(())
    }

    async fn remove(&self, job_id: JobId) -> QueueResult<()> {
        let mut conn = self.pool.get().await.map_err(JobError::from)?;

        let mut cmd = redis::Cmd::new();
        cmd.arg("ZREM").arg(self.due_set_key()).arg(job_id.to_string());
        conn.execute(cmd).await.map_err(JobError::from)?;

        let mut in_flight_cmd = redis::Cmd::new();
        in_flight_cmd.arg("SREM").arg(self.in_flight_set_key()).arg(job_id.to_string());
        conn.execute(in_flight_cmd).await.map_err(JobError::from)?;

        conn.del(&self.item_key(job_id)).await.map_err(JobError::from)?;
        Ok(())
    }

    async fn dequeue(&self) -> QueueResult<Option<DispatchItem>> {
        let mut conn = self.pool.get().await.map_err(JobError::from)?;

        let now = Utc::now().timestamp_millis();
        let mut cmd = redis::Cmd::new();
        cmd.arg("ZRANGEBYSCORE").arg(self.due_set_key()).arg("-inf").arg(now).arg("LIMIT").arg(0).arg(1);
        let ids: Vec<String> = redis::from_redis_value(
            &conn.execute(cmd).await.map_err(JobError::from)?,
        )
        .map_err(|e| JobError::Serialization(e.to_string()))?;

        let Some(id_str) = ids.into_iter().next() else { return Ok(None) };
        let job_id = Uuid::parse_str(&id_str).map_err(|e| JobError::Serialization(e.to_string()))?;

        let mut zrem = redis::Cmd::new();
        zrem.arg("ZREM").arg(self.due_set_key()).arg(&id_str);
        conn.execute(zrem).await.map_err(JobError::from)?;

        let mut sadd = redis::Cmd::new();
        sadd.arg("SADD").arg(self.in_flight_set_key()).arg(&id_str);
        conn.execute(sadd).await.map_err(JobError::from)?;

        match conn.get(&self.item_key(job_id)).await.map_err(JobError::from)? {
            Some(data) => {
                let item: DispatchItem =
                    serde_json::from_slice(&data).map_err(|e| JobError::Serialization(e.to_string()))?;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    async fn complete(&self, item: &DispatchItem) -> QueueResult<()> {
        let mut conn = self.pool.get().await.map_err(JobError::from)?;
        let mut cmd = redis::Cmd::new();
        cmd.arg("SREM").arg(self.in_flight_set_key()).arg(item.job_id.to_string());
        conn.execute(cmd).await.map_err(JobError::from)?;
        conn.del(&self.item_key(item.job_id)).await.map_err(JobError::from)?;
        Ok(())
    }

    async fn fail(&self, item: &DispatchItem, is_final: bool, retry_delay: chrono::Duration) -> QueueResult<()> {
        let mut conn = self.pool.get().await.map_err(JobError::from)?;
        let mut srem = redis::Cmd::new();
        srem.arg("SREM").arg(self.in_flight_set_key()).arg(item.job_id.to_string());
        conn.execute(srem).await.map_err(JobError::from)?;

        if is_final {
            conn.del(&self.item_key(item.job_id)).await.map_err(JobError::from)?;
            return Ok(());
        }

        let mut next = item.clone();
        next.attempt += 1;
        next.available_at = Utc::now() + retry_delay;
        let data = serde_json::to_vec(&next).map_err(|e| JobError::Serialization(e.to_string()))?;
        conn.setex(&self.item_key(item.job_id), 7 * 24 * 3600, &data).await.map_err(JobError::from)?;

        let mut zadd = redis::Cmd::new();
        zadd.arg("ZADD").arg(self.due_set_key()).arg(next.available_at.timestamp_millis()).arg(item.job_id.to_string());
        conn.execute(zadd).await.map_err(JobError::from)?;
        Ok(())
    }

    async fn stats(&self) -> QueueResult<QueueStats> {
        let mut conn = self.pool.get().await.map_err(JobError::from)?;

        let mut pending_cmd = redis::Cmd::new();
        pending_cmd.arg("ZCARD").arg(self.due_set_key());
        let pending: i64 =
            redis::from_redis_value(&conn.execute(pending_cmd).await.map_err(JobError::from)?)
                .map_err(|e| JobError::Serialization(e.to_string()))?;

        let mut in_flight_cmd = redis::Cmd::new();
        in_flight_cmd.arg("SCARD").arg(self.in_flight_set_key());
        let in_flight: i64 =
            redis::from_redis_value(&conn.execute(in_flight_cmd).await.map_err(JobError::from)?)
                .map_err(|e| JobError::Serialization(e.to_string()))?;

        Ok(QueueStats { pending: pending as usize, in_flight: in_flight as usize })
    }
}

/// In-memory dispatch queue for unit tests exercising scheduler/executor
/// logic without a Redis dependency.
#[derive(Default)]
pub struct InMemoryDispatchQueue {
    items: Mutex<HashMap<JobId, DispatchItem>>,
    in_flight: Mutex<HashMap<JobId, DispatchItem>>,
    order: Mutex<VecDeque<JobId>>,
}

impl InMemoryDispatchQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DispatchQueueBackend for InMemoryDispatchQueue {
    async fn enqueue(&self, job_id: JobId, payload: serde_json::Value, delay: chrono::Duration, priority: i32) -> QueueResult<()> {
        let available_at = Utc::now() + delay;
        let item = DispatchItem { job_id, payload, attempt: 1, priority, available_at };

        let mut items = self.items.lock().unwrap();
        let is_new = !items.contains_key(&job_id);
        items.insert(job_id, item);
        drop(items);

        self.in_flight.lock().unwrap().remove(&job_id);

        if is_new {
            self.order.lock().unwrap().push_back(job_id);
        }
        Ok(())
    }

    async fn remove(&self, job_id: JobId) -> QueueResult<()> {
        self.items.lock().unwrap().remove(&job_id);
        self.in_flight.lock().unwrap().remove(&job_id);
        self.order.lock().unwrap().retain(|id| *id != job_id);
        Ok(())
    }

    async fn dequeue(&self) -> QueueResult<Option<DispatchItem>> {
        let now = Utc::now();
        let mut order = self.order.lock().unwrap();
        let mut items = self.items.lock().unwrap();

        let due_index = order.iter().position(|id| {
            items.get(id).map_or(false, |item| item.available_at <= now)
        });

        let Some(index) = due_index else { return Ok(None) };
        let job_id = order.remove(index).unwrap();
        let Some(item) = items.remove(&job_id) else { return Ok(None) };
        self.in_flight.lock().unwrap().insert(job_id, item.clone());
        Ok(Some(item))
    }

    async fn complete(&self, item: &DispatchItem) -> QueueResult<()> {
        self.in_flight.lock().unwrap().remove(&item.job_id);
        Ok(())
    }

    async fn fail(&self, item: &DispatchItem, is_final: bool, retry_delay: chrono::Duration) -> QueueResult<()> {
        self.in_flight.lock().unwrap().remove(&item.job_id);
        if is_final {
            return Ok(());
        }
        let mut next = item.clone();
        next.attempt += 1;
        next.available_at = Utc::now() + retry_delay;
        self.items.lock().unwrap().insert(item.job_id, next);
        self.order.lock().unwrap().push_back(item.job_id);
        Ok(())
    }

    async fn stats(&self) -> QueueResult<QueueStats> {
        Ok(QueueStats {
            pending: self.items.lock().unwrap().len(),
            in_flight: self.in_flight.lock().unwrap().len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_enqueue_is_idempotent_by_job_id() {
        let queue = InMemoryDispatchQueue::new();
        let job_id = Uuid::new_v4();

        queue.enqueue(job_id, serde_json::json!({"a": 1}), chrono::Duration::zero(), 5).await.unwrap();
        queue.enqueue(job_id, serde_json::json!({"a": 2}), chrono::Duration::zero(), 5).await.unwrap();

        assert_eq!(queue.stats().await.unwrap().pending, 1);
        let item = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(item.payload, serde_json::json!({"a": 2}));
        assert!(queue.dequeue().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dequeue_respects_delay() {
        let queue = InMemoryDispatchQueue::new();
        let job_id = Uuid::new_v4();
        queue.enqueue(job_id, serde_json::json!({}), chrono::Duration::hours(1), 5).await.unwrap();
        assert!(queue.dequeue().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fail_requeues_unless_final() {
        let queue = InMemoryDispatchQueue::new();
        let job_id = Uuid::new_v4();
        queue.enqueue(job_id, serde_json::json!({}), chrono::Duration::zero(), 5).await.unwrap();
        let item = queue.dequeue().await.unwrap().unwrap();

        queue.fail(&item, false, chrono::Duration::zero()).await.unwrap();
        let retried = queue.dequeue().await.unwrap().unwrap();
        assert_eq!(retried.attempt, 2);

        queue.fail(&retried, true, chrono::Duration::zero()).await.unwrap();
        assert!(queue.dequeue().await.unwrap().is_none());
        assert_eq!(queue.stats().await.unwrap().in_flight, 0);
    }

    #[tokio::test]
    async fn test_remove_drops_pending_entry() {
        let queue = InMemoryDispatchQueue::new();
        let job_id = Uuid::new_v4();
        queue.enqueue(job_id, serde_json::json!({}), chrono::Duration::zero(), 5).await.unwrap();
        queue.remove(job_id).await.unwrap();
        assert!(queue.dequeue().await.unwrap().is_none());
    }
}
