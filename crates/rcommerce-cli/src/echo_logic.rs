//! Minimal stand-in `JobLogic`.
//!
//! The core scheduler deliberately ships no opinion on what a job's
//! execution actually does (HTTP callback, shell command, internal task);
//! that's left to the embedding binary. This one just logs the job's
//! payload and reports success, mirroring how `LoggingNotificationSink`
//! stands in for a real notification transport.

use tracing::info;

use rcommerce_core::jobs::job::{ExecutionOutcome, Job};
use rcommerce_core::jobs::{JobLogic, JobProcessingResult};

pub struct EchoJobLogic;

#[async_trait::async_trait]
impl JobLogic for EchoJobLogic {
    async fn run(&self, job: &Job) -> JobProcessingResult<ExecutionOutcome> {
        info!(job_id = %job.id, job_name = %job.name, payload = %job.payload, "echo job logic ran");
        Ok(ExecutionOutcome::Success { output: Some(job.payload.clone()) })
    }
}
