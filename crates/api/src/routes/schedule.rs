use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use types::ScheduleRequest;
use utoipa::ToSchema;

#[derive(serde::Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobCreated {
    pub job_id: String,
    pub status: &'static str,
}

#[utoipa::path(
    post,
    path = "/v1/schedule",
    request_body = ScheduleRequest,
    responses((status = 202, description = "Scheduling job enqueued", body = JobCreated))
)]
pub async fn schedule(
    State(state): State<AppState>,
    Json(request): Json<ScheduleRequest>,
) -> (StatusCode, Json<JobCreated>) {
    let id = state.jobs.enqueue(request);
    (
        StatusCode::ACCEPTED,
        Json(JobCreated {
            job_id: id.0,
            status: "queued",
        }),
    )
}
