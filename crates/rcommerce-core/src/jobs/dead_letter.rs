//! Dead-letter sink for dispatch items that exhausted all retry attempts
//!
//! The store already keeps the authoritative `Execution` row (status
//! `Failed`) for a terminal failure; this sink is an additional, bounded,
//! in-process view used by operators for a quick "what just died" look
//! without a store round trip. Default capacity matches the failed-terminal
//! retention policy (500 entries).

use crate::jobs::job::{Job, JobId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use uuid::Uuid;

pub const DEFAULT_DEAD_LETTER_CAPACITY: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub id: Uuid,
    pub job_id: JobId,
    pub job_name: String,
    pub owner: String,
    pub final_error: String,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
}

impl DeadLetterEntry {
    pub fn new(job: &Job, final_error: String, attempts: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id: job.id,
            job_name: job.name.clone(),
            owner: job.owner.clone(),
            final_error,
            attempts,
            created_at: Utc::now(),
        }
    }
}

/// Bounded, oldest-evicted-first ring of dead-letter entries.
pub struct DeadLetterSink {
    entries: Mutex<VecDeque<DeadLetterEntry>>,
    capacity: usize,
}

impl DeadLetterSink {
    pub fn new(capacity: usize) -> Self {
        Self { entries: Mutex::new(VecDeque::new()), capacity }
    }

    pub fn push(&self, entry: DeadLetterEntry) {
        let mut entries = self.entries.lock().unwrap();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    pub fn snapshot(&self) -> Vec<DeadLetterEntry> {
        self.entries.lock().unwrap().iter().cloned().collect()
    }
}

impl Default for DeadLetterSink {
    fn default() -> Self {
        Self::new(DEFAULT_DEAD_LETTER_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::job::{JobKind, JobStatus};

    fn test_job(name: &str) -> Job {
        Job {
            id: Uuid::new_v4(),
            owner: "tenant-1".into(),
            name: name.into(),
            description: None,
            kind: JobKind::OneTime,
            schedule_kind: "immediate".into(),
            scheduled_time: None,
            cron_expression: None,
            next_run: None,
            payload: serde_json::json!({}),
            timeout_secs: 300,
            max_retries: 3,
            status: JobStatus::Failed,
            retry_count: 3,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_executed_at: None,
        }
    }

    #[test]
    fn test_push_evicts_oldest_past_capacity() {
        let sink = DeadLetterSink::new(2);
        sink.push(DeadLetterEntry::new(&test_job("job1"), "boom".into(), 3));
        sink.push(DeadLetterEntry::new(&test_job("job2"), "boom".into(), 3));
        sink.push(DeadLetterEntry::new(&test_job("job3"), "boom".into(), 3));

        assert_eq!(sink.len(), 2);
        let names: Vec<_> = sink.snapshot().into_iter().map(|e| e.job_name).collect();
        assert_eq!(names, vec!["job2", "job3"]);
    }
}
