use std::collections::HashMap;
use thiserror::Error;
use types::{
    Assignment, AssignmentId, Classroom, ClassroomId, ConstraintHierarchy, CourseSection,
    SchedulingConflict, SchedulingProblem, SchedulingSolution, SectionId, Teacher, TeacherId,
    TimeSlot, TimeSlotId,
};

macro_rules! identity {
    ($id:expr, $def:expr, $name:expr, $tier:ident, $rule:expr) => {
        fn id(&self) -> u32 {
            $id
        }
        fn definition_id(&self) -> &'static str {
            $def
        }
        fn name(&self) -> &'static str {
            $name
        }
        fn hierarchy(&self) -> types::ConstraintHierarchy {
            types::ConstraintHierarchy::$tier
        }
        fn basic_rule(&self) -> &'static str {
            $rule
        }
        fn state(&self) -> &$crate::constraints::ConstraintState {
            &self.state
        }
        fn state_mut(&mut self) -> &mut $crate::constraints::ConstraintState {
            &mut self.state
        }
    };
}

mod hard;
mod soft;

pub use hard::{
    ClassroomAvailabilityConstraint, ClassroomCapacityConstraint, ClassroomConflictConstraint,
    GenderSegregationConstraint, TeacherAvailabilityConstraint, TeacherConflictConstraint,
};
pub use soft::{
    CampusTravelTimeConstraint, ClassroomTypeMatchConstraint, EquipmentRequirementConstraint,
    TeacherMobilityConstraint, TeacherPreferenceConstraint, TeacherScheduleCompactnessConstraint,
    TeacherWorkloadConstraint,
};

pub mod rules {
    pub const RESOURCE_CONFLICT_AVOIDANCE: &str = "ResourceConflictAvoidance";
    pub const RESOURCE_CAPACITY_RESPECT: &str = "ResourceCapacityRespect";
    pub const RESOURCE_AVAILABILITY: &str = "ResourceAvailability";
    pub const RESOURCE_MATCHING: &str = "ResourceMatching";
    pub const TEACHER_PREFERENCE: &str = "TeacherPreference";
    pub const TEACHER_COMFORT: &str = "TeacherComfort";
}

pub type Evaluated = (f64, Vec<SchedulingConflict>);

#[derive(Debug, Error)]
pub enum ConstraintError {
    #[error("assignment {assignment} references unknown {entity} {id}")]
    MissingReference {
        assignment: AssignmentId,
        entity: &'static str,
        id: u32,
    },
}

#[derive(Clone, Debug)]
pub struct ConstraintState {
    weight: f64,
    active: bool,
}

impl ConstraintState {
    pub fn new(weight: f64) -> Self {
        Self {
            weight,
            active: true,
        }
    }
}

/// A scoring rule over a whole solution. Scores live in [0, 1]; hard rules
/// must reach exactly 1.0 for the solution to be feasible.
pub trait Constraint: Send + Sync {
    fn id(&self) -> u32;
    fn definition_id(&self) -> &'static str;
    fn name(&self) -> &'static str;
    fn hierarchy(&self) -> ConstraintHierarchy;
    fn basic_rule(&self) -> &'static str;
    fn state(&self) -> &ConstraintState;
    fn state_mut(&mut self) -> &mut ConstraintState;

    fn evaluate(
        &self,
        problem: &SchedulingProblem,
        solution: &SchedulingSolution,
    ) -> Result<Evaluated, ConstraintError>;

    fn is_hard(&self) -> bool {
        matches!(
            self.hierarchy(),
            ConstraintHierarchy::Level1CoreHard | ConstraintHierarchy::Level2ConfigurableHard
        )
    }

    fn weight(&self) -> f64 {
        if self.is_hard() {
            1.0
        } else {
            self.state().weight
        }
    }

    /// Hard constraints keep weight 1.0; soft weights are clamped to [0, 1].
    fn set_weight(&mut self, weight: f64) {
        if !self.is_hard() {
            self.state_mut().weight = weight.clamp(0.0, 1.0);
        }
    }

    fn is_active(&self) -> bool {
        self.state().active
    }

    fn set_active(&mut self, active: bool) {
        self.state_mut().active = active;
    }
}

/// Full constraint catalogue for a problem. Settings decide which optional
/// rules take part at all.
pub fn default_constraints(problem: &SchedulingProblem) -> Vec<Box<dyn Constraint>> {
    let settings = &problem.settings;
    let mut all: Vec<Box<dyn Constraint>> = vec![
        Box::new(TeacherConflictConstraint::new()),
        Box::new(ClassroomConflictConstraint::new()),
        Box::new(ClassroomCapacityConstraint::new()),
        Box::new(ClassroomAvailabilityConstraint::new()),
        Box::new(TeacherAvailabilityConstraint::new()),
    ];
    if settings.enable_gender_segregation {
        all.push(Box::new(GenderSegregationConstraint::new()));
    }
    all.push(Box::new(ClassroomTypeMatchConstraint::new()));
    all.push(Box::new(EquipmentRequirementConstraint::new()));
    all.push(Box::new(TeacherPreferenceConstraint::new()));
    all.push(Box::new(TeacherWorkloadConstraint::new()));
    all.push(Box::new(TeacherScheduleCompactnessConstraint::new(
        settings.maximum_consecutive_classes,
    )));
    all.push(Box::new(TeacherMobilityConstraint::new()));
    if settings.enable_multi_campus_constraints {
        all.push(Box::new(CampusTravelTimeConstraint::new(
            settings.minimum_travel_time,
        )));
    }
    all
}

/// Id lookups over a problem, built once per evaluation.
pub struct ProblemIndex<'p> {
    pub sections: HashMap<SectionId, &'p CourseSection>,
    pub teachers: HashMap<TeacherId, &'p Teacher>,
    pub classrooms: HashMap<ClassroomId, &'p Classroom>,
    pub timeslots: HashMap<TimeSlotId, &'p TimeSlot>,
}

impl<'p> ProblemIndex<'p> {
    pub fn new(problem: &'p SchedulingProblem) -> Self {
        Self {
            sections: problem.sections.iter().map(|s| (s.id, s)).collect(),
            teachers: problem.teachers.iter().map(|t| (t.id, t)).collect(),
            classrooms: problem.classrooms.iter().map(|c| (c.id, c)).collect(),
            timeslots: problem.timeslots.iter().map(|t| (t.id, t)).collect(),
        }
    }

    pub fn section(&self, a: &Assignment) -> Result<&'p CourseSection, ConstraintError> {
        self.sections
            .get(&a.section_id)
            .copied()
            .ok_or_else(|| missing(a, "section", a.section_id.0))
    }

    pub fn teacher(&self, a: &Assignment) -> Result<&'p Teacher, ConstraintError> {
        self.teachers
            .get(&a.teacher_id)
            .copied()
            .ok_or_else(|| missing(a, "teacher", a.teacher_id.0))
    }

    pub fn classroom(&self, a: &Assignment) -> Result<&'p Classroom, ConstraintError> {
        self.classrooms
            .get(&a.classroom_id)
            .copied()
            .ok_or_else(|| missing(a, "classroom", a.classroom_id.0))
    }

    pub fn timeslot(&self, a: &Assignment) -> Result<&'p TimeSlot, ConstraintError> {
        self.timeslots
            .get(&a.timeslot_id)
            .copied()
            .ok_or_else(|| missing(a, "timeslot", a.timeslot_id.0))
    }
}

fn missing(a: &Assignment, entity: &'static str, id: u32) -> ConstraintError {
    ConstraintError::MissingReference {
        assignment: a.id,
        entity,
        id,
    }
}

/// Pass/fail scoring used by the hard rules.
pub(crate) fn binary(conflicts: Vec<SchedulingConflict>) -> Evaluated {
    (if conflicts.is_empty() { 1.0 } else { 0.0 }, conflicts)
}
