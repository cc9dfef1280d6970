//! Control-surface error body and the `JobError` -> HTTP mapping from spec
//! section 7's error taxonomy.

use axum::http::StatusCode;
use axum::Json;
use rcommerce_core::jobs::JobError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
}

pub type ApiError = (StatusCode, Json<ErrorBody>);

pub fn job_error_response(err: JobError) -> ApiError {
    let (status, kind) = match &err {
        JobError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
        JobError::ScheduledTimeInPast(_) => (StatusCode::BAD_REQUEST, "scheduled_time_in_past"),
        JobError::InvalidCron(_) | JobError::UnsatisfiableSchedule(_) => {
            (StatusCode::BAD_REQUEST, "invalid_cron")
        }
        JobError::NotFound(_) | JobError::JobGone(_) => (StatusCode::NOT_FOUND, "not_found"),
        JobError::ForbiddenTransition(_) => (StatusCode::CONFLICT, "forbidden_transition"),
        JobError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
        JobError::ExecutionTimeout(_)
        | JobError::ExecutionError(_)
        | JobError::RetriesExhausted(_)
        | JobError::StoreUnavailable(_)
        | JobError::QueueUnavailable(_)
        | JobError::WorkerShutdown
        | JobError::Serialization(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    };

    (status, Json(ErrorBody { kind, message: err.to_string() }))
}

pub fn unauthorized(message: impl Into<String>) -> ApiError {
    (StatusCode::UNAUTHORIZED, Json(ErrorBody { kind: "unauthorized", message: message.into() }))
}
