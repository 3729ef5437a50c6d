use std::collections::{BTreeMap, BTreeSet};
use types::{
    Assignment, ClassroomId, ConflictSeverity, ConflictType, SchedulingConflict,
    SchedulingProblem, SchedulingSolution, TeacherId, TimeSlotId,
};

use super::{binary, rules, Constraint, ConstraintError, ConstraintState, Evaluated, ProblemIndex};

pub struct TeacherConflictConstraint {
    state: ConstraintState,
}

impl TeacherConflictConstraint {
    pub fn new() -> Self {
        Self {
            state: ConstraintState::new(1.0),
        }
    }
}

impl Default for TeacherConflictConstraint {
    fn default() -> Self {
        Self::new()
    }
}

impl Constraint for TeacherConflictConstraint {
    identity!(
        1,
        "TeacherConflict",
        "Teacher double booking",
        Level1CoreHard,
        rules::RESOURCE_CONFLICT_AVOIDANCE
    );

    fn evaluate(
        &self,
        problem: &SchedulingProblem,
        solution: &SchedulingSolution,
    ) -> Result<Evaluated, ConstraintError> {
        let mut by_slot: BTreeMap<(TeacherId, TimeSlotId), Vec<&Assignment>> = BTreeMap::new();
        for a in solution.assignments() {
            by_slot.entry((a.teacher_id, a.timeslot_id)).or_default().push(a);
        }
        let conflicts = by_slot
            .into_iter()
            .filter(|(_, group)| group.len() > 1)
            .map(|((teacher, slot), group)| {
                let name = problem.teacher(teacher).map_or("?", |t| t.name.as_str());
                SchedulingConflict::new(
                    self.id(),
                    ConflictType::TeacherConflict,
                    ConflictSeverity::Critical,
                    format!("teacher {name} has {} classes in timeslot {slot}", group.len()),
                )
                .with_sections(group.iter().map(|a| a.section_id))
                .with_teachers([teacher])
                .with_timeslots([slot])
            })
            .collect();
        Ok(binary(conflicts))
    }
}

pub struct ClassroomConflictConstraint {
    state: ConstraintState,
}

impl ClassroomConflictConstraint {
    pub fn new() -> Self {
        Self {
            state: ConstraintState::new(1.0),
        }
    }
}

impl Default for ClassroomConflictConstraint {
    fn default() -> Self {
        Self::new()
    }
}

impl Constraint for ClassroomConflictConstraint {
    identity!(
        2,
        "ClassroomConflict",
        "Classroom double booking",
        Level1CoreHard,
        rules::RESOURCE_CONFLICT_AVOIDANCE
    );

    fn evaluate(
        &self,
        problem: &SchedulingProblem,
        solution: &SchedulingSolution,
    ) -> Result<Evaluated, ConstraintError> {
        let mut by_slot: BTreeMap<(ClassroomId, TimeSlotId), Vec<&Assignment>> = BTreeMap::new();
        for a in solution.assignments() {
            by_slot.entry((a.classroom_id, a.timeslot_id)).or_default().push(a);
        }
        let conflicts = by_slot
            .into_iter()
            .filter(|(_, group)| {
                // a cross-listed group meeting together is one class
                group.len() > 1 && !group.windows(2).all(|w| w[0].shares_room_with(w[1]))
            })
            .map(|((room, slot), group)| {
                let name = problem.classroom(room).map_or("?", |c| c.name.as_str());
                SchedulingConflict::new(
                    self.id(),
                    ConflictType::ClassroomConflict,
                    ConflictSeverity::Critical,
                    format!("classroom {name} hosts {} classes in timeslot {slot}", group.len()),
                )
                .with_sections(group.iter().map(|a| a.section_id))
                .with_classrooms([room])
                .with_timeslots([slot])
            })
            .collect();
        Ok(binary(conflicts))
    }
}

pub struct ClassroomCapacityConstraint {
    state: ConstraintState,
}

impl ClassroomCapacityConstraint {
    pub fn new() -> Self {
        Self {
            state: ConstraintState::new(1.0),
        }
    }
}

impl Default for ClassroomCapacityConstraint {
    fn default() -> Self {
        Self::new()
    }
}

impl Constraint for ClassroomCapacityConstraint {
    identity!(
        3,
        "ClassroomCapacity",
        "Classroom capacity",
        Level1CoreHard,
        rules::RESOURCE_CAPACITY_RESPECT
    );

    fn evaluate(
        &self,
        problem: &SchedulingProblem,
        solution: &SchedulingSolution,
    ) -> Result<Evaluated, ConstraintError> {
        let index = ProblemIndex::new(problem);
        // sections sharing a room and slot (cross-listed) count together
        let mut by_slot: BTreeMap<(ClassroomId, TimeSlotId), Vec<&Assignment>> = BTreeMap::new();
        for a in solution.assignments() {
            by_slot.entry((a.classroom_id, a.timeslot_id)).or_default().push(a);
        }
        let mut conflicts = Vec::new();
        for ((room_id, slot), group) in by_slot {
            let room = index.classroom(group[0])?;
            let mut enrollment = 0;
            for a in &group {
                enrollment += index.section(a)?.enrollment;
            }
            if enrollment > room.capacity {
                conflicts.push(
                    SchedulingConflict::new(
                        self.id(),
                        ConflictType::ClassroomCapacityExceeded,
                        ConflictSeverity::Critical,
                        format!(
                            "classroom {} holds {} but {} students are enrolled",
                            room.name, room.capacity, enrollment
                        ),
                    )
                    .with_sections(group.iter().map(|a| a.section_id))
                    .with_classrooms([room_id])
                    .with_timeslots([slot]),
                );
            }
        }
        Ok(binary(conflicts))
    }
}

pub struct ClassroomAvailabilityConstraint {
    state: ConstraintState,
}

impl ClassroomAvailabilityConstraint {
    pub fn new() -> Self {
        Self {
            state: ConstraintState::new(1.0),
        }
    }
}

impl Default for ClassroomAvailabilityConstraint {
    fn default() -> Self {
        Self::new()
    }
}

impl Constraint for ClassroomAvailabilityConstraint {
    identity!(
        201,
        "ClassroomAvailability",
        "Classroom availability",
        Level2ConfigurableHard,
        rules::RESOURCE_AVAILABILITY
    );

    fn evaluate(
        &self,
        problem: &SchedulingProblem,
        solution: &SchedulingSolution,
    ) -> Result<Evaluated, ConstraintError> {
        let conflicts = solution
            .assignments()
            .iter()
            .filter(|a| problem.classroom_unavailable(a.classroom_id, a.timeslot_id))
            .map(|a| {
                SchedulingConflict::new(
                    self.id(),
                    ConflictType::ClassroomUnavailable,
                    ConflictSeverity::Severe,
                    format!(
                        "classroom {} is unavailable in timeslot {}",
                        a.classroom_name, a.timeslot_id
                    ),
                )
                .with_sections([a.section_id])
                .with_classrooms([a.classroom_id])
                .with_timeslots([a.timeslot_id])
            })
            .collect();
        Ok(binary(conflicts))
    }
}

pub struct TeacherAvailabilityConstraint {
    state: ConstraintState,
}

impl TeacherAvailabilityConstraint {
    pub fn new() -> Self {
        Self {
            state: ConstraintState::new(1.0),
        }
    }
}

impl Default for TeacherAvailabilityConstraint {
    fn default() -> Self {
        Self::new()
    }
}

impl Constraint for TeacherAvailabilityConstraint {
    identity!(
        202,
        "TeacherAvailability",
        "Teacher availability",
        Level2ConfigurableHard,
        rules::RESOURCE_AVAILABILITY
    );

    fn evaluate(
        &self,
        problem: &SchedulingProblem,
        solution: &SchedulingSolution,
    ) -> Result<Evaluated, ConstraintError> {
        let conflicts = solution
            .assignments()
            .iter()
            .filter(|a| problem.teacher_unavailable(a.teacher_id, a.timeslot_id))
            .map(|a| {
                SchedulingConflict::new(
                    self.id(),
                    ConflictType::TeacherUnavailable,
                    ConflictSeverity::Severe,
                    format!(
                        "teacher {} is unavailable in timeslot {}",
                        a.teacher_name, a.timeslot_id
                    ),
                )
                .with_sections([a.section_id])
                .with_teachers([a.teacher_id])
                .with_timeslots([a.timeslot_id])
            })
            .collect();
        Ok(binary(conflicts))
    }
}

/// Sections restricted to different genders may not meet in the same
/// building at the same time.
pub struct GenderSegregationConstraint {
    state: ConstraintState,
}

impl GenderSegregationConstraint {
    pub fn new() -> Self {
        Self {
            state: ConstraintState::new(1.0),
        }
    }
}

impl Default for GenderSegregationConstraint {
    fn default() -> Self {
        Self::new()
    }
}

impl Constraint for GenderSegregationConstraint {
    identity!(
        203,
        "GenderSegregation",
        "Gender segregation",
        Level2ConfigurableHard,
        rules::RESOURCE_AVAILABILITY
    );

    fn evaluate(
        &self,
        problem: &SchedulingProblem,
        solution: &SchedulingSolution,
    ) -> Result<Evaluated, ConstraintError> {
        let index = ProblemIndex::new(problem);
        let mut by_building: BTreeMap<(&str, TimeSlotId), Vec<(&Assignment, String)>> =
            BTreeMap::new();
        for a in solution.assignments() {
            let Some(gender) = index.section(a)?.gender() else {
                continue;
            };
            let building = index.classroom(a)?.building.as_str();
            by_building
                .entry((building, a.timeslot_id))
                .or_default()
                .push((a, gender.to_ascii_lowercase()));
        }
        let mut conflicts = Vec::new();
        for ((building, slot), group) in by_building {
            let genders: BTreeSet<&str> = group.iter().map(|(_, g)| g.as_str()).collect();
            if genders.len() > 1 {
                conflicts.push(
                    SchedulingConflict::new(
                        self.id(),
                        ConflictType::GenderSegregation,
                        ConflictSeverity::Critical,
                        format!(
                            "sections restricted to different genders share building {building} in timeslot {slot}"
                        ),
                    )
                    .with_sections(group.iter().map(|(a, _)| a.section_id))
                    .with_timeslots([slot]),
                );
            }
        }
        Ok(binary(conflicts))
    }
}
