use axum::Json;
use serde::Deserialize;
use utoipa::ToSchema;

use sched_core::{CancellationToken, SchedulingContext};
use types::{
    Assignment, SchedulingEvaluation, SchedulingParameters, SchedulingProblem, SchedulingSolution,
    SolutionId,
};

use crate::error::ApiError;

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateIn {
    pub problem: SchedulingProblem,
    pub assignments: Vec<Assignment>,
    /// Decides the constraint level and soft weights.
    #[serde(default)]
    pub parameters: SchedulingParameters,
}

/// First id in `a` the problem does not define.
fn unknown_reference(problem: &SchedulingProblem, a: &Assignment) -> Option<String> {
    let missing = if problem.section(a.section_id).is_none() {
        format!("section {}", a.section_id)
    } else if problem.teacher(a.teacher_id).is_none() {
        format!("teacher {}", a.teacher_id)
    } else if problem.classroom(a.classroom_id).is_none() {
        format!("classroom {}", a.classroom_id)
    } else if problem.timeslot(a.timeslot_id).is_none() {
        format!("timeslot {}", a.timeslot_id)
    } else {
        return None;
    };
    Some(format!("assignment {} references unknown {missing}", a.id))
}

#[utoipa::path(
    post,
    path = "/v1/evaluate",
    request_body = EvaluateIn,
    responses(
        (status = 200, description = "Per-constraint breakdown of the given timetable", body = SchedulingEvaluation),
        (status = 400, description = "Assignments reference unknown entities")
    )
)]
pub async fn evaluate(Json(input): Json<EvaluateIn>) -> Result<Json<SchedulingEvaluation>, ApiError> {
    let problem = &input.problem;
    if let Some(msg) = input
        .assignments
        .iter()
        .find_map(|a| unknown_reference(problem, a))
    {
        return Err(ApiError::bad_request(msg));
    }
    let assignments = input
        .assignments
        .into_iter()
        .map(|mut a| {
            a.refresh(problem);
            a
        })
        .collect();
    let solution = SchedulingSolution::from_raw(SolutionId(0), problem.id, assignments);
    let ctx = SchedulingContext::new(problem, &input.parameters, CancellationToken::new());
    let evaluation = ctx.evaluate(&solution);
    if let Some(err) = evaluation
        .conflicts
        .iter()
        .find(|c| c.conflict_type == types::ConflictType::ConstraintEvaluationError)
    {
        return Err(ApiError::bad_request(err.description.clone()));
    }
    Ok(Json(evaluation))
}
