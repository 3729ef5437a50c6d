mod error;
mod state;
mod telemetry;
pub mod routes {
    pub mod evaluate;
    pub mod health;
    pub mod jobs;
    pub mod schedule;
    pub mod validate;
}

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

const PORT_VAR: &str = "TIMETABLE__SERVER__PORT";
const DEFAULT_PORT: u16 = 8080;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health,
        routes::validate::validate_handler,
        routes::evaluate::evaluate,
        routes::schedule::schedule,
        routes::jobs::status,
        routes::jobs::result,
        routes::jobs::cancel,
    ),
    components(schemas(
        types::SchedulingProblem, types::CourseSection, types::Teacher, types::Classroom,
        types::TimeSlot, types::TeacherAvailability, types::ClassroomAvailability,
        types::TeacherCoursePreference, types::ConstraintSettings, types::SchedulingParameters,
        types::AlgorithmSettings, types::ConflictResolutionStrategy, types::LocalSearch,
        types::ConstraintLevel, types::ScheduleRequest, types::SchedulingResult,
        types::SchedulingStatus, types::SchedulingStatistics, types::SolutionSummary,
        types::SchedulingSolution, types::Assignment, types::SchedulingEvaluation,
        types::ConstraintEvaluation, types::SchedulingConflict, types::ConflictType,
        types::ConflictSeverity, types::ConstraintHierarchy, types::Score,
        types::SectionId, types::TeacherId, types::ClassroomId, types::TimeSlotId,
        types::AssignmentId, types::SolutionId, types::CourseId, types::DepartmentId,
        types::CampusId,
        jobs::JobId, jobs::JobStatus,
        routes::health::Health,
        routes::validate::ValidationReport,
        routes::evaluate::EvaluateIn,
        routes::schedule::JobCreated,
    )),
    tags(
        (name = "timetable", description = "University timetable scheduling API")
    )
)]
struct ApiDoc;

fn app(state: state::AppState) -> Router {
    Router::new()
        .route("/v1/health", get(routes::health::health))
        .route("/v1/validate", post(routes::validate::validate_handler))
        .route("/v1/evaluate", post(routes::evaluate::evaluate))
        .route("/v1/schedule", post(routes::schedule::schedule))
        .route("/v1/jobs/:id", get(routes::jobs::status))
        .route("/v1/jobs/:id/result", get(routes::jobs::result))
        .route("/v1/jobs/:id/cancel", post(routes::jobs::cancel))
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(telemetry::stack())
        .with_state(state)
}

fn listen_addr() -> anyhow::Result<SocketAddr> {
    let port = match std::env::var(PORT_VAR) {
        Ok(raw) => raw
            .parse::<u16>()
            .map_err(|e| anyhow::anyhow!("{PORT_VAR}={raw}: {e}"))?,
        Err(_) => DEFAULT_PORT,
    };
    Ok(SocketAddr::from(([0, 0, 0, 0], port)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    let addr = listen_addr()?;
    tracing::info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state::AppState::new_default()))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    fn problem() -> Value {
        json!({
            "id": 3,
            "sections": [
                { "id": 1, "courseId": 1, "code": "MATH101", "enrollment": 30 },
                { "id": 2, "courseId": 2, "code": "PHYS101", "enrollment": 25 }
            ],
            "teachers": [{ "id": 1, "name": "Ada" }, { "id": 2, "name": "Alan" }],
            "classrooms": [{ "id": 1, "name": "A-101", "building": "A", "capacity": 40 }],
            "timeslots": [
                { "id": 1, "dayOfWeek": 1, "startMinutes": 480, "endMinutes": 570 },
                { "id": 2, "dayOfWeek": 1, "startMinutes": 600, "endMinutes": 690 }
            ]
        })
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = app(state::AppState::new_default());
        let (status, body) = call(&app, "GET", "/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn validate_lists_every_error() {
        let app = app(state::AppState::new_default());
        let (_, ok) = call(&app, "POST", "/v1/validate", Some(problem())).await;
        assert_eq!(ok["ok"], true);

        let mut bad = problem();
        bad["sections"][1]["id"] = json!(1);
        bad["timeslots"][0]["dayOfWeek"] = json!(8);
        let (_, report) = call(&app, "POST", "/v1/validate", Some(bad)).await;
        assert_eq!(report["ok"], false);
        assert_eq!(report["errors"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn evaluate_flags_double_booking() {
        let app = app(state::AppState::new_default());
        let body = json!({
            "problem": problem(),
            "assignments": [
                { "id": 1, "sectionId": 1, "teacherId": 1, "classroomId": 1, "timeslotId": 1 },
                { "id": 2, "sectionId": 2, "teacherId": 2, "classroomId": 1, "timeslotId": 1 }
            ]
        });
        let (status, eval) = call(&app, "POST", "/v1/evaluate", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(eval["score"]["kind"], "infeasible");
        assert!(eval["conflicts"]
            .as_array()
            .unwrap()
            .iter()
            .any(|c| c["conflictType"] == "ClassroomConflict"));
    }

    #[tokio::test]
    async fn evaluate_rejects_unknown_references() {
        let app = app(state::AppState::new_default());
        let body = json!({
            "problem": problem(),
            "assignments": [
                { "id": 1, "sectionId": 1, "teacherId": 99, "classroomId": 1, "timeslotId": 1 }
            ]
        });
        let (status, err) = call(&app, "POST", "/v1/evaluate", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["error"], "assignment 1 references unknown teacher 99");

        let body = json!({
            "problem": problem(),
            "assignments": [
                { "id": 1, "sectionId": 2, "teacherId": 1, "classroomId": 1, "timeslotId": 7 }
            ]
        });
        let (status, _) = call(&app, "POST", "/v1/evaluate", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn schedule_job_runs_to_completion() {
        let app = app(state::AppState::new_default());
        let (status, created) =
            call(&app, "POST", "/v1/schedule", Some(json!({ "problem": problem() }))).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let id = created["jobId"].as_str().unwrap().to_string();

        let mut finished = false;
        for _ in 0..400 {
            let (_, job) = call(&app, "GET", &format!("/v1/jobs/{id}"), None).await;
            if job["status"] == "Finished" {
                finished = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(finished);

        let (status, result) = call(&app, "GET", &format!("/v1/jobs/{id}/result"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(result["status"], "Success");
        assert_eq!(result["statistics"]["scheduledSections"], 2);

        let (status, _) = call(&app, "POST", &format!("/v1/jobs/{id}/cancel"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let app = app(state::AppState::new_default());
        let (status, body) = call(&app, "GET", "/v1/jobs/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "job nope not found");
    }
}
