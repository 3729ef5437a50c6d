use axum::{http::StatusCode, Json};
use sched_core::{validate, ValidationError};
use serde::Serialize;
use solver_heur::ProblemAnalyzer;
use types::SchedulingProblem;

#[derive(Serialize, utoipa::ToSchema)]
pub struct ValidationReport {
    pub ok: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    /// 0 for trivial problems, 1 for large heavily constrained ones.
    pub complexity: f64,
}

#[utoipa::path(
    post,
    path = "/v1/validate",
    request_body = SchedulingProblem,
    responses(
        (status = 200, description = "Validation result", body = ValidationReport)
    )
)]
pub async fn validate_handler(
    Json(problem): Json<SchedulingProblem>,
) -> (StatusCode, Json<ValidationReport>) {
    let complexity = ProblemAnalyzer.analyze(&problem).complexity;
    let errors = match validate(&problem) {
        Ok(()) => Vec::new(),
        Err(ValidationError::Msg(msg)) => msg
            .split(';')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    };
    (
        StatusCode::OK,
        Json(ValidationReport {
            ok: errors.is_empty(),
            errors,
            complexity,
        }),
    )
}
