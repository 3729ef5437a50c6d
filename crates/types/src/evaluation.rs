use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use utoipa::ToSchema;

use crate::{ClassroomId, SectionId, SolutionId, TeacherId, TimeSlotId};

#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq, Eq, PartialOrd,
    Ord, Hash,
)]
pub enum ConstraintHierarchy {
    Level1CoreHard,
    Level2ConfigurableHard,
    Level3PhysicalSoft,
    Level4QualitySoft,
}

#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq, Eq, PartialOrd,
    Ord, Hash,
)]
pub enum ConflictSeverity {
    Minor,
    Moderate,
    Severe,
    Critical,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq, Eq, Hash)]
pub enum ConflictType {
    TeacherConflict,
    ClassroomConflict,
    TeacherAvailabilityConflict,
    ClassroomAvailabilityConflict,
    ClassroomCapacityExceeded,
    ClassroomTypeMismatch,
    CampusTravelTimeConflict,
    PrerequisiteConflict,
    TeacherWorkloadExceeded,
    ConstraintEvaluationError,
    BuildingDistanceConflict,
    TeacherUnavailable,
    ClassroomUnavailable,
    EquipmentMismatch,
    GenderSegregation,
    Other,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingConflict {
    pub constraint_id: u32,
    pub conflict_type: ConflictType,
    pub severity: ConflictSeverity,
    pub description: String,
    #[serde(default)]
    pub sections: Vec<SectionId>,
    #[serde(default)]
    pub teachers: Vec<TeacherId>,
    #[serde(default)]
    pub classrooms: Vec<ClassroomId>,
    #[serde(default)]
    pub timeslots: Vec<TimeSlotId>,
}

impl SchedulingConflict {
    pub fn new(
        constraint_id: u32,
        conflict_type: ConflictType,
        severity: ConflictSeverity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            constraint_id,
            conflict_type,
            severity,
            description: description.into(),
            sections: Vec::new(),
            teachers: Vec::new(),
            classrooms: Vec::new(),
            timeslots: Vec::new(),
        }
    }

    pub fn with_sections(mut self, ids: impl IntoIterator<Item = SectionId>) -> Self {
        self.sections.extend(ids);
        self
    }

    pub fn with_teachers(mut self, ids: impl IntoIterator<Item = TeacherId>) -> Self {
        self.teachers.extend(ids);
        self
    }

    pub fn with_classrooms(mut self, ids: impl IntoIterator<Item = ClassroomId>) -> Self {
        self.classrooms.extend(ids);
        self
    }

    pub fn with_timeslots(mut self, ids: impl IntoIterator<Item = TimeSlotId>) -> Self {
        self.timeslots.extend(ids);
        self
    }

    /// Number of entities touched, used as a tiebreak when ordering repairs.
    pub fn involved_count(&self) -> usize {
        self.sections.len() + self.teachers.len() + self.classrooms.len()
    }
}

/// Outcome of evaluating a solution. Infeasible sorts below every feasible score.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Score {
    Infeasible,
    Feasible { value: f64 },
}

impl Score {
    pub fn feasible(value: f64) -> Self {
        Score::Feasible { value }
    }

    pub fn is_feasible(&self) -> bool {
        matches!(self, Score::Feasible { .. })
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Score::Feasible { value } => Some(*value),
            Score::Infeasible => None,
        }
    }

    pub fn value_or(&self, fallback: f64) -> f64 {
        self.value().unwrap_or(fallback)
    }

    pub fn total_cmp(&self, other: &Score) -> Ordering {
        match (self, other) {
            (Score::Infeasible, Score::Infeasible) => Ordering::Equal,
            (Score::Infeasible, Score::Feasible { .. }) => Ordering::Less,
            (Score::Feasible { .. }, Score::Infeasible) => Ordering::Greater,
            (Score::Feasible { value: a }, Score::Feasible { value: b }) => a.total_cmp(b),
        }
    }

    pub fn is_better_than(&self, other: &Score) -> bool {
        self.total_cmp(other) == Ordering::Greater
    }
}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.total_cmp(other))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintEvaluation {
    pub constraint_id: u32,
    pub definition_id: String,
    pub name: String,
    pub hierarchy: ConstraintHierarchy,
    pub is_hard: bool,
    pub weight: f64,
    pub score: f64,
    pub satisfied: bool,
    #[serde(default)]
    pub conflicts: Vec<SchedulingConflict>,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingEvaluation {
    pub solution_id: SolutionId,
    pub score: Score,
    #[serde(default)]
    pub physical_score: f64,
    #[serde(default)]
    pub quality_score: f64,
    #[serde(default)]
    pub hard_evaluations: Vec<ConstraintEvaluation>,
    #[serde(default)]
    pub soft_evaluations: Vec<ConstraintEvaluation>,
    #[serde(default)]
    pub conflicts: Vec<SchedulingConflict>,
}

impl SchedulingEvaluation {
    pub fn is_feasible(&self) -> bool {
        self.score.is_feasible()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infeasible_never_beats_feasible() {
        let zero = Score::feasible(0.0);
        assert!(zero.is_better_than(&Score::Infeasible));
        assert!(!Score::Infeasible.is_better_than(&zero));
        assert!(!Score::Infeasible.is_better_than(&Score::Infeasible));
        assert!(Score::feasible(0.7) > Score::feasible(0.69));
        assert_eq!(Score::Infeasible.value_or(-1.0), -1.0);
    }

    #[test]
    fn severity_orders_minor_to_critical() {
        let mut v = vec![
            ConflictSeverity::Severe,
            ConflictSeverity::Minor,
            ConflictSeverity::Critical,
            ConflictSeverity::Moderate,
        ];
        v.sort();
        assert_eq!(
            v,
            vec![
                ConflictSeverity::Minor,
                ConflictSeverity::Moderate,
                ConflictSeverity::Severe,
                ConflictSeverity::Critical
            ]
        );
    }

    #[test]
    fn score_wire_shape() {
        insta::assert_yaml_snapshot!(
            vec![Score::feasible(0.5), Score::Infeasible],
            @r###"
        - kind: feasible
          value: 0.5
        - kind: infeasible
        "###
        );
    }
}
