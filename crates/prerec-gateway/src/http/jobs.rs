//! Job API: create, list and delete scheduled playbacks.
//!
//! Handlers are thin: validation lives in [`CreateJobRequest::validate`] and
//! every state change goes through the [`prerec_scheduler::JobStore`], so the
//! API and the trigger engine see the same table.

use axum::{
    extract::{FromRequest, Path, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    Form, Json,
};
use chrono_tz::Tz;
use prerec_scheduler::{
    request::format_local, CreateJobRequest, DeleteOutcome, JobStatus, ScheduledJob,
    SchedulerError,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::app::AppState;

type ApiError = (StatusCode, Json<Value>);

/// One row of the job listing, times rendered in the station timezone.
#[derive(Debug, Serialize)]
pub struct JobView {
    pub id: String,
    pub name: String,
    /// Trigger instant (start minus setup lead), RFC 3339 with local offset.
    pub next_run_time: String,
    /// Requested start as `YYYY-MM-DDTHH:MM`.
    pub start_time: String,
    pub status: JobStatus,
    pub args: Value,
    pub kwargs: Value,
}

impl JobView {
    pub fn new(job: &ScheduledJob, tz: Tz) -> Self {
        Self {
            id: job.id.clone(),
            name: job.name.clone(),
            next_run_time: job.trigger_at.with_timezone(&tz).to_rfc3339(),
            start_time: format_local(job.start_at, tz),
            status: job.status,
            args: job.args(),
            kwargs: json!({}),
        }
    }
}

/// Create-request body, accepted as JSON or as an urlencoded form post.
pub struct CreateBody(pub CreateJobRequest);

impl<S> FromRequest<S> for CreateBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

        if is_form {
            Form::<CreateJobRequest>::from_request(req, state)
                .await
                .map(|Form(body)| Self(body))
                .map_err(|e| bad_body(e.body_text()))
        } else {
            Json::<CreateJobRequest>::from_request(req, state)
                .await
                .map(|Json(body)| Self(body))
                .map_err(|e| bad_body(e.body_text()))
        }
    }
}

/// POST /jobs (and legacy POST /add)
///
/// Returns 201 + the stored job; 400 when validation fails, in which case
/// nothing is stored.
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    CreateBody(req): CreateBody,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let new_job = req
        .validate(state.tz, state.config.schedule.setup_lead_secs)
        .map_err(|e| {
            warn!(name = ?req.name, "job rejected: {e}");
            scheduler_error(e)
        })?;
    let job = state.store.create(new_job).map_err(scheduler_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "ok": true, "job": JobView::new(&job, state.tz) })),
    ))
}

/// GET /jobs (and legacy GET /list)
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<JobView>>, ApiError> {
    let jobs = state.store.get_all().map_err(scheduler_error)?;
    Ok(Json(jobs.iter().map(|j| JobView::new(j, state.tz)).collect()))
}

/// DELETE /jobs/{id} (and legacy GET|DELETE /delete/{id})
///
/// Deleting a job that is already playing is accepted but changes nothing.
pub async fn delete_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match state.store.delete(&id).map_err(scheduler_error)? {
        DeleteOutcome::Removed => Ok(Json(json!({ "ok": true, "removed": id }))),
        DeleteOutcome::AlreadyFiring => {
            info!(job_id = %id, "delete requested for firing job");
            Ok(Json(json!({ "ok": true, "removed": null, "firing": true })))
        }
    }
}

fn scheduler_error(e: SchedulerError) -> ApiError {
    let status = match &e {
        SchedulerError::Validation(_) => StatusCode::BAD_REQUEST,
        SchedulerError::JobNotFound { .. } => StatusCode::NOT_FOUND,
        SchedulerError::Database(inner) => {
            error!("job store error: {inner}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(json!({ "error": e.to_string(), "code": e.code() })))
}

fn bad_body(reason: String) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": reason, "code": "INVALID_BODY" })),
    )
}
