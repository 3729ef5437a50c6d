#[macro_use]
pub mod constraints;
pub mod conflict;
pub mod context;
pub mod evaluator;
pub mod manager;
pub mod moves;
pub mod rules;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;

pub use conflict::{ConflictHandler, ConflictResolutionOption, ConflictResolver, ResolveError};
pub use constraints::{default_constraints, Constraint, ConstraintError};
pub use context::{CancellationToken, SchedulingContext};
pub use evaluator::SolutionEvaluator;
pub use manager::ConstraintManager;
pub use moves::{Move, MoveGenerator, Vary};
pub use types::{
    Assignment, ScheduleRequest, SchedulingParameters, SchedulingProblem, SchedulingResult,
    SchedulingSolution, Score,
};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid problem: {0}")]
    Msg(String),
}

/// Collects every structural problem with the input instead of stopping at
/// the first one.
pub fn validate(problem: &SchedulingProblem) -> Result<(), ValidationError> {
    let mut errors: Vec<String> = Vec::new();

    if problem.sections.is_empty() {
        errors.push("sections is empty".into());
    }
    if problem.timeslots.is_empty() {
        errors.push("timeslots is empty".into());
    }

    fn chk_unique<I: ToString>(name: &str, ids: impl Iterator<Item = I>, errors: &mut Vec<String>) {
        let mut seen = HashSet::new();
        for id in ids {
            let s = id.to_string();
            if !seen.insert(s.clone()) {
                errors.push(format!("duplicate {name} id: {s}"));
            }
        }
    }
    chk_unique("section", problem.sections.iter().map(|x| x.id), &mut errors);
    chk_unique("teacher", problem.teachers.iter().map(|x| x.id), &mut errors);
    chk_unique("classroom", problem.classrooms.iter().map(|x| x.id), &mut errors);
    chk_unique("timeslot", problem.timeslots.iter().map(|x| x.id), &mut errors);

    let teachers: HashSet<_> = problem.teachers.iter().map(|t| t.id).collect();
    let rooms: HashSet<_> = problem.classrooms.iter().map(|c| c.id).collect();
    let slots: HashSet<_> = problem.timeslots.iter().map(|t| t.id).collect();

    for t in &problem.timeslots {
        if !(1..=7).contains(&t.day_of_week) {
            errors.push(format!("timeslot {} has invalid day {}", t.id, t.day_of_week));
        }
        if t.start_minutes >= t.end_minutes {
            errors.push(format!("timeslot {} starts at or after its end", t.id));
        }
    }

    for a in &problem.teacher_availability {
        if !teachers.contains(&a.teacher_id) {
            errors.push(format!("availability references missing teacher {}", a.teacher_id));
        }
        if !slots.contains(&a.timeslot_id) {
            errors.push(format!("availability references missing timeslot {}", a.timeslot_id));
        }
    }
    for a in &problem.classroom_availability {
        if !rooms.contains(&a.classroom_id) {
            errors.push(format!("availability references missing classroom {}", a.classroom_id));
        }
        if !slots.contains(&a.timeslot_id) {
            errors.push(format!("availability references missing timeslot {}", a.timeslot_id));
        }
    }
    for p in &problem.teacher_preferences {
        if !teachers.contains(&p.teacher_id) {
            errors.push(format!("preference references missing teacher {}", p.teacher_id));
        }
    }

    let largest = problem.classrooms.iter().map(|c| c.capacity).max().unwrap_or(0);
    for s in &problem.sections {
        if s.enrollment > largest {
            errors.push(format!(
                "section {} is unschedulable: enrollment {} exceeds every classroom",
                s.id, s.enrollment
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::Msg(errors.join("; ")))
    }
}

#[async_trait]
pub trait Solver: Send + Sync + 'static {
    async fn solve(
        &self,
        request: ScheduleRequest,
        cancel: CancellationToken,
    ) -> anyhow::Result<SchedulingResult>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use types::{TeacherAvailability, TeacherId, TimeSlotId};

    #[test]
    fn fixture_is_valid() {
        let p = Fixture::new().sections(3).teachers(2).classrooms(2).timeslots(4).build();
        validate(&p).unwrap();
    }

    #[test]
    fn validation_accumulates_every_error() {
        let mut p = Fixture::new().sections(2).teachers(1).classrooms(1).timeslots(2).build();
        p.sections[1].id = p.sections[0].id;
        p.sections[0].enrollment = 500;
        p.timeslots[1].day_of_week = 9;
        p.teacher_availability.push(TeacherAvailability {
            teacher_id: TeacherId(7),
            timeslot_id: TimeSlotId(1),
            is_available: false,
            preference_level: 0,
        });
        let ValidationError::Msg(msg) = validate(&p).unwrap_err();
        assert!(msg.contains("duplicate section id: 1"));
        assert!(msg.contains("invalid day 9"));
        assert!(msg.contains("missing teacher 7"));
        assert!(msg.contains("enrollment 500"));
    }

    #[test]
    fn empty_problem_is_rejected() {
        let err = validate(&SchedulingProblem::default()).unwrap_err();
        assert!(err.to_string().contains("sections is empty"));
    }
}
