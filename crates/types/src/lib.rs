mod evaluation;
mod params;
mod problem;
mod result;
mod solution;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

pub use evaluation::{
    ConflictSeverity, ConflictType, ConstraintEvaluation, ConstraintHierarchy,
    SchedulingConflict, SchedulingEvaluation, Score,
};
pub use params::{
    AlgorithmSettings, ConflictResolutionStrategy, ConstraintLevel, ConstraintSettings,
    LocalSearch, SchedulingParameters,
};
pub use problem::{
    split_items, Classroom, ClassroomAvailability, CourseSection, SchedulingProblem, Teacher,
    TeacherAvailability, TeacherCoursePreference, TimeSlot,
};
pub use result::{
    ScheduleRequest, SchedulingResult, SchedulingStatistics, SchedulingStatus, SolutionSummary,
};
pub use solution::{default_week_pattern, Assignment, SchedulingSolution, SolutionError};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Clone,
            Copy,
            Debug,
            Default,
            Serialize,
            Deserialize,
            ToSchema,
            JsonSchema,
            Eq,
            PartialEq,
            Ord,
            PartialOrd,
            Hash,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}
id_newtype!(SectionId);
id_newtype!(CourseId);
id_newtype!(TeacherId);
id_newtype!(ClassroomId);
id_newtype!(TimeSlotId);
id_newtype!(DepartmentId);
id_newtype!(CampusId);
id_newtype!(AssignmentId);
id_newtype!(SolutionId);
