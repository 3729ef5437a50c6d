use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{ConstraintLevel, SchedulingParameters, SchedulingProblem, SchedulingSolution, Score, SolutionId};

/// What the calling layer hands to the engine.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub problem: SchedulingProblem,
    /// Recommended from the problem's features when absent.
    #[serde(default)]
    pub parameters: Option<SchedulingParameters>,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq, Eq)]
pub enum SchedulingStatus {
    #[default]
    NotStarted,
    Success,
    PartialSuccess,
    Failure,
    Error,
    Cancelled,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SolutionSummary {
    pub solution_id: SolutionId,
    pub algorithm: String,
    pub score: Score,
    pub assigned_sections: usize,
    pub conflict_count: usize,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingStatistics {
    pub total_sections: usize,
    pub scheduled_sections: usize,
    pub unscheduled_sections: usize,
    pub total_teachers: usize,
    pub total_classrooms: usize,
    #[serde(default)]
    pub constraint_level: Option<ConstraintLevel>,
    #[serde(default)]
    pub solutions: Vec<SolutionSummary>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingResult {
    pub status: SchedulingStatus,
    pub solutions: Vec<SchedulingSolution>,
    pub message: String,
    pub execution_time_ms: u64,
    pub statistics: SchedulingStatistics,
}

impl SchedulingResult {
    pub fn error(message: impl Into<String>, execution_time_ms: u64) -> Self {
        Self {
            status: SchedulingStatus::Error,
            message: message.into(),
            execution_time_ms,
            ..Default::default()
        }
    }

    pub fn best(&self) -> Option<&SchedulingSolution> {
        self.solutions.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_result_wire_shape() {
        insta::assert_yaml_snapshot!(SchedulingResult::error("boom", 12), @r###"
        status: Error
        solutions: []
        message: boom
        executionTimeMs: 12
        statistics:
          totalSections: 0
          scheduledSections: 0
          unscheduledSections: 0
          totalTeachers: 0
          totalClassrooms: 0
          constraintLevel: ~
          solutions: []
        "###);
    }

    #[test]
    fn request_without_parameters() {
        let r: ScheduleRequest = serde_json::from_str(
            r#"{"problem": {"id": 4, "sections": [], "teachers": [], "classrooms": [], "timeslots": []}}"#,
        ).unwrap();
        assert_eq!(r.problem.id, 4);
        assert!(r.parameters.is_none());
    }
}
