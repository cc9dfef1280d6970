//! Job scheduling control surface
//!
//! `CreateJob`, `ListJobs`, `GetJob`, `UpdateJob`, `DeleteJob`, `PauseJob`,
//! `ResumeJob`, `TriggerJob`, `UpcomingJobs`, `GetExecutions`,
//! `GetExecution`, `GetExecutionLogs` from the external interface section.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use rcommerce_core::jobs::clock::Clock;
use rcommerce_core::jobs::queue::DispatchQueueBackend;
use rcommerce_core::jobs::store::JobStoreBackend;
use rcommerce_core::jobs::{
    Execution, ExecutionId, ExecutionLog, Job, JobFilter, JobId, JobKind, JobPatch, JobStatus,
    NewJob, Page, PageResult, Schedule, SortDirection, SortField,
};

use crate::error::{job_error_response, ApiError};
use crate::middleware::OwnerId;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub name: String,
    pub description: Option<String>,
    pub kind: JobKind,
    pub schedule: Schedule,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub timeout_secs: Option<i32>,
    pub max_retries: Option<i32>,
}

impl From<CreateJobRequest> for NewJob {
    fn from(req: CreateJobRequest) -> Self {
        NewJob {
            name: req.name,
            description: req.description,
            kind: req.kind,
            schedule: req.schedule,
            payload: req.payload,
            timeout_secs: req.timeout_secs,
            max_retries: req.max_retries,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateJobRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub cron_expression: Option<String>,
    pub payload: Option<serde_json::Value>,
    pub timeout_secs: Option<i32>,
    pub status: Option<JobStatus>,
}

impl From<UpdateJobRequest> for JobPatch {
    fn from(req: UpdateJobRequest) -> Self {
        JobPatch {
            name: req.name,
            description: req.description,
            cron_expression: req.cron_expression,
            payload: req.payload,
            timeout_secs: req.timeout_secs,
            status: req.status,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<JobStatus>,
    pub kind: Option<JobKind>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpcomingQuery {
    /// Hours ahead of now to look for upcoming runs. Defaults to 24h per spec.
    pub horizon_hours: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub status: &'static str,
}

async fn create_job<S, Q, C>(
    State(state): State<AppState<S, Q, C>>,
    OwnerId(owner): OwnerId,
    Json(req): Json<CreateJobRequest>,
) -> Result<Json<Job>, ApiError>
where
    S: JobStoreBackend,
    Q: DispatchQueueBackend,
    C: Clock,
{
    state
        .scheduler
        .create_job(&owner, req.into())
        .await
        .map(Json)
        .map_err(job_error_response)
}

async fn list_jobs<S, Q, C>(
    State(state): State<AppState<S, Q, C>>,
    OwnerId(owner): OwnerId,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<PageResult<Job>>, ApiError>
where
    S: JobStoreBackend,
    Q: DispatchQueueBackend,
    C: Clock,
{
    let filter = JobFilter { status: query.status, kind: query.kind };
    let page = Page {
        limit: query.limit.unwrap_or(50),
        offset: query.offset.unwrap_or(0),
        sort: SortField::CreatedAt,
        direction: SortDirection::Desc,
    };

    state.scheduler.list_jobs(&owner, &filter, &page).await.map(Json).map_err(job_error_response)
}

async fn get_job<S, Q, C>(
    State(state): State<AppState<S, Q, C>>,
    OwnerId(owner): OwnerId,
    Path(id): Path<JobId>,
) -> Result<Json<Job>, ApiError>
where
    S: JobStoreBackend,
    Q: DispatchQueueBackend,
    C: Clock,
{
    state.scheduler.get_job(&owner, id).await.map(Json).map_err(job_error_response)
}

async fn update_job<S, Q, C>(
    State(state): State<AppState<S, Q, C>>,
    OwnerId(owner): OwnerId,
    Path(id): Path<JobId>,
    Json(req): Json<UpdateJobRequest>,
) -> Result<Json<Job>, ApiError>
where
    S: JobStoreBackend,
    Q: DispatchQueueBackend,
    C: Clock,
{
    state
        .scheduler
        .update_job(&owner, id, req.into())
        .await
        .map(Json)
        .map_err(job_error_response)
}

async fn delete_job<S, Q, C>(
    State(state): State<AppState<S, Q, C>>,
    OwnerId(owner): OwnerId,
    Path(id): Path<JobId>,
) -> Result<StatusCode, ApiError>
where
    S: JobStoreBackend,
    Q: DispatchQueueBackend,
    C: Clock,
{
    state.scheduler.delete_job(&owner, id).await.map(|_| StatusCode::NO_CONTENT).map_err(job_error_response)
}

async fn pause_job<S, Q, C>(
    State(state): State<AppState<S, Q, C>>,
    OwnerId(owner): OwnerId,
    Path(id): Path<JobId>,
) -> Result<Json<Job>, ApiError>
where
    S: JobStoreBackend,
    Q: DispatchQueueBackend,
    C: Clock,
{
    state.scheduler.pause_job(&owner, id).await.map(Json).map_err(job_error_response)
}

async fn resume_job<S, Q, C>(
    State(state): State<AppState<S, Q, C>>,
    OwnerId(owner): OwnerId,
    Path(id): Path<JobId>,
) -> Result<Json<Job>, ApiError>
where
    S: JobStoreBackend,
    Q: DispatchQueueBackend,
    C: Clock,
{
    state.scheduler.resume_job(&owner, id).await.map(Json).map_err(job_error_response)
}

async fn trigger_job<S, Q, C>(
    State(state): State<AppState<S, Q, C>>,
    OwnerId(owner): OwnerId,
    Path(id): Path<JobId>,
) -> Result<Json<TriggerResponse>, ApiError>
where
    S: JobStoreBackend,
    Q: DispatchQueueBackend,
    C: Clock,
{
    state
        .scheduler
        .trigger_job(&owner, id)
        .await
        .map(|_| Json(TriggerResponse { status: "queued" }))
        .map_err(job_error_response)
}

async fn upcoming_jobs<S, Q, C>(
    State(state): State<AppState<S, Q, C>>,
    OwnerId(owner): OwnerId,
    Query(query): Query<UpcomingQuery>,
) -> Result<Json<Vec<Job>>, ApiError>
where
    S: JobStoreBackend,
    Q: DispatchQueueBackend,
    C: Clock,
{
    let horizon = Utc::now() + chrono::Duration::hours(query.horizon_hours.unwrap_or(24));
    state.scheduler.upcoming_jobs(&owner, horizon).await.map(Json).map_err(job_error_response)
}

async fn get_executions<S, Q, C>(
    State(state): State<AppState<S, Q, C>>,
    OwnerId(owner): OwnerId,
    Path(id): Path<JobId>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<PageResult<Execution>>, ApiError>
where
    S: JobStoreBackend,
    Q: DispatchQueueBackend,
    C: Clock,
{
    let page = Page {
        limit: query.limit.unwrap_or(50),
        offset: query.offset.unwrap_or(0),
        sort: SortField::CreatedAt,
        direction: SortDirection::Desc,
    };

    state.scheduler.get_executions(&owner, id, &page).await.map(Json).map_err(job_error_response)
}

async fn get_execution<S, Q, C>(
    State(state): State<AppState<S, Q, C>>,
    OwnerId(owner): OwnerId,
    Path(execution_id): Path<ExecutionId>,
) -> Result<Json<Execution>, ApiError>
where
    S: JobStoreBackend,
    Q: DispatchQueueBackend,
    C: Clock,
{
    state.scheduler.get_execution(&owner, execution_id).await.map(Json).map_err(job_error_response)
}

async fn get_execution_logs<S, Q, C>(
    State(state): State<AppState<S, Q, C>>,
    OwnerId(owner): OwnerId,
    Path(execution_id): Path<ExecutionId>,
) -> Result<Json<Vec<ExecutionLog>>, ApiError>
where
    S: JobStoreBackend,
    Q: DispatchQueueBackend,
    C: Clock,
{
    state
        .scheduler
        .get_execution_logs(&owner, execution_id)
        .await
        .map(Json)
        .map_err(job_error_response)
}

pub fn router<S, Q, C>() -> Router<AppState<S, Q, C>>
where
    S: JobStoreBackend + 'static,
    Q: DispatchQueueBackend + 'static,
    C: Clock + 'static,
{
    Router::new()
        .route("/jobs", post(create_job).get(list_jobs))
        .route("/jobs/upcoming", get(upcoming_jobs))
        .route("/jobs/:id", patch(update_job).get(get_job).delete(delete_job))
        .route("/jobs/:id/pause", post(pause_job))
        .route("/jobs/:id/resume", post(resume_job))
        .route("/jobs/:id/trigger", post(trigger_job))
        .route("/jobs/:id/executions", get(get_executions))
        .route("/executions/:id", get(get_execution))
        .route("/executions/:id/logs", get(get_execution_logs))
}
