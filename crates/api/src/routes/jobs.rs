use crate::{error::ApiError, state::AppState};
use axum::{
    extract::{Path, State},
    Json,
};
use jobs::JobStatus;
use types::SchedulingResult;

#[utoipa::path(
    get,
    path = "/v1/jobs/{id}",
    params(("id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job status", body = JobStatus),
        (status = 404, description = "Unknown job")
    )
)]
pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobStatus>, ApiError> {
    state
        .jobs
        .get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format_args!("job {id}")))
}

#[utoipa::path(
    get,
    path = "/v1/jobs/{id}/result",
    params(("id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Scheduling result", body = SchedulingResult),
        (status = 404, description = "Unknown job"),
        (status = 409, description = "Job has no result yet or ended without one")
    )
)]
pub async fn result(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SchedulingResult>, ApiError> {
    match state.jobs.get(&id) {
        Some(JobStatus::Finished { result }) => Ok(Json(result)),
        Some(JobStatus::Failed { message }) => Err(ApiError::conflict(message)),
        Some(other) => Err(ApiError::conflict(format!("job is {other:?}"))),
        None => Err(ApiError::not_found(format_args!("job {id}"))),
    }
}

#[utoipa::path(
    post,
    path = "/v1/jobs/{id}/cancel",
    params(("id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Cancellation requested", body = JobStatus),
        (status = 404, description = "Unknown job"),
        (status = 409, description = "Job already finished")
    )
)]
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobStatus>, ApiError> {
    if state.jobs.cancel(&id) {
        return Ok(Json(JobStatus::Cancelled));
    }
    match state.jobs.get(&id) {
        Some(_) => Err(ApiError::conflict("job already finished")),
        None => Err(ApiError::not_found(format_args!("job {id}"))),
    }
}
