//! Notification sink — fire-and-forget terminal-failure delivery
//!
//! The transport (email, webhook, pager) is an external collaborator; this
//! crate only defines the envelope and a logging no-op implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::job::JobId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobFailureNotification {
    pub job_id: JobId,
    pub job_name: String,
    pub owner: String,
    pub error: String,
    pub attempts: u32,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Best-effort delivery; failures to deliver must not propagate back
    /// into the executor's control flow.
    async fn emit(&self, notification: JobFailureNotification);
}

/// Default sink: logs at warn level and drops. Good enough until a real
/// transport is wired in by the binary that embeds this crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotificationSink;

#[async_trait]
impl NotificationSink for LoggingNotificationSink {
    async fn emit(&self, notification: JobFailureNotification) {
        warn!(
            job_id = %notification.job_id,
            owner = %notification.owner,
            attempts = notification.attempts,
            "job_failure: {} — {}",
            notification.job_name,
            notification.error
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_logging_sink_does_not_panic() {
        let sink = LoggingNotificationSink;
        sink.emit(JobFailureNotification {
            job_id: JobId::new_v4(),
            job_name: "nightly-report".into(),
            owner: "tenant-1".into(),
            error: "retries exhausted".into(),
            attempts: 3,
            timestamp: Utc::now(),
        })
        .await;
    }
}
