use std::collections::BTreeMap;
use types::{
    Assignment, ConflictSeverity, ConflictType, SchedulingConflict, SchedulingProblem,
    SchedulingSolution, TeacherId, TimeSlot,
};

use super::{rules, Constraint, ConstraintError, ConstraintState, Evaluated, ProblemIndex};
use crate::rules::{longest_run, room_type_satisfies, HOURS_PER_ASSIGNMENT};

/// Gap in minutes under which two classes count as back to back for travel.
const MOBILITY_GAP_MINUTES: i32 = 20;
/// Score used when a teacher has no preference record for the course.
const NEUTRAL_PREFERENCE: f64 = 0.6;

type TeacherDays<'s, 'p> = BTreeMap<(TeacherId, u8), Vec<(&'s Assignment, &'p TimeSlot)>>;

/// Each teacher's classes per day, ordered by start time.
fn teacher_days<'s, 'p>(
    index: &ProblemIndex<'p>,
    solution: &'s SchedulingSolution,
) -> Result<TeacherDays<'s, 'p>, ConstraintError> {
    let mut days = TeacherDays::new();
    for a in solution.assignments() {
        let slot = index.timeslot(a)?;
        days.entry((a.teacher_id, slot.day_of_week))
            .or_default()
            .push((a, slot));
    }
    for day in days.values_mut() {
        day.sort_by_key(|(_, slot)| slot.start_minutes);
    }
    Ok(days)
}

fn ratio(good: usize, total: usize) -> f64 {
    if total == 0 {
        1.0
    } else {
        good as f64 / total as f64
    }
}

pub struct ClassroomTypeMatchConstraint {
    state: ConstraintState,
}

impl ClassroomTypeMatchConstraint {
    pub fn new() -> Self {
        Self {
            state: ConstraintState::new(0.7),
        }
    }
}

impl Default for ClassroomTypeMatchConstraint {
    fn default() -> Self {
        Self::new()
    }
}

impl Constraint for ClassroomTypeMatchConstraint {
    identity!(
        7,
        "ClassroomTypeMatch",
        "Classroom type match",
        Level3PhysicalSoft,
        rules::RESOURCE_MATCHING
    );

    fn evaluate(
        &self,
        problem: &SchedulingProblem,
        solution: &SchedulingSolution,
    ) -> Result<Evaluated, ConstraintError> {
        let index = ProblemIndex::new(problem);
        let mut matched = 0;
        let mut conflicts = Vec::new();
        for a in solution.assignments() {
            let section = index.section(a)?;
            let room = index.classroom(a)?;
            match section.room_type_requirement() {
                Some(req) if !room_type_satisfies(&room.room_type, req) => conflicts.push(
                    SchedulingConflict::new(
                        self.id(),
                        ConflictType::ClassroomTypeMismatch,
                        ConflictSeverity::Moderate,
                        format!(
                            "{} needs a {req} room but {} is {}",
                            section.code, room.name, room.room_type
                        ),
                    )
                    .with_sections([a.section_id])
                    .with_classrooms([a.classroom_id]),
                ),
                _ => matched += 1,
            }
        }
        Ok((ratio(matched, solution.len()), conflicts))
    }
}

pub struct EquipmentRequirementConstraint {
    state: ConstraintState,
}

impl EquipmentRequirementConstraint {
    pub fn new() -> Self {
        Self {
            state: ConstraintState::new(0.8),
        }
    }
}

impl Default for EquipmentRequirementConstraint {
    fn default() -> Self {
        Self::new()
    }
}

impl Constraint for EquipmentRequirementConstraint {
    identity!(
        8,
        "EquipmentRequirement",
        "Equipment requirement",
        Level3PhysicalSoft,
        rules::RESOURCE_MATCHING
    );

    fn evaluate(
        &self,
        problem: &SchedulingProblem,
        solution: &SchedulingSolution,
    ) -> Result<Evaluated, ConstraintError> {
        let index = ProblemIndex::new(problem);
        let mut with_needs = 0;
        let mut met = 0;
        let mut conflicts = Vec::new();
        for a in solution.assignments() {
            let section = index.section(a)?;
            if section.equipment_items().next().is_none() {
                continue;
            }
            with_needs += 1;
            let room = index.classroom(a)?;
            let missing: Vec<&str> = section
                .equipment_items()
                .filter(|item| !room.has_equipment(item))
                .collect();
            if missing.is_empty() {
                met += 1;
            } else {
                conflicts.push(
                    SchedulingConflict::new(
                        self.id(),
                        ConflictType::EquipmentMismatch,
                        ConflictSeverity::Moderate,
                        format!("{} lacks {} for {}", room.name, missing.join(", "), section.code),
                    )
                    .with_sections([a.section_id])
                    .with_classrooms([a.classroom_id]),
                );
            }
        }
        Ok((ratio(met, with_needs), conflicts))
    }
}

pub struct TeacherPreferenceConstraint {
    state: ConstraintState,
}

impl TeacherPreferenceConstraint {
    pub fn new() -> Self {
        Self {
            state: ConstraintState::new(0.7),
        }
    }
}

impl Default for TeacherPreferenceConstraint {
    fn default() -> Self {
        Self::new()
    }
}

impl Constraint for TeacherPreferenceConstraint {
    identity!(
        4,
        "TeacherPreference",
        "Teacher course preference",
        Level4QualitySoft,
        rules::TEACHER_PREFERENCE
    );

    fn evaluate(
        &self,
        problem: &SchedulingProblem,
        solution: &SchedulingSolution,
    ) -> Result<Evaluated, ConstraintError> {
        if solution.is_empty() {
            return Ok((1.0, Vec::new()));
        }
        let index = ProblemIndex::new(problem);
        let mut total = 0.0;
        let mut conflicts = Vec::new();
        for a in solution.assignments() {
            let section = index.section(a)?;
            let Some(pref) = problem.preference(a.teacher_id, section.course_id) else {
                total += NEUTRAL_PREFERENCE;
                continue;
            };
            total += f64::from(pref.preference_level.min(5)) / 5.0;
            if pref.preference_level < 3 {
                let severity = if pref.preference_level < 2 {
                    ConflictSeverity::Moderate
                } else {
                    ConflictSeverity::Minor
                };
                conflicts.push(
                    SchedulingConflict::new(
                        self.id(),
                        ConflictType::Other,
                        severity,
                        format!(
                            "{} rates {} at preference {}",
                            a.teacher_name, section.code, pref.preference_level
                        ),
                    )
                    .with_sections([a.section_id])
                    .with_teachers([a.teacher_id]),
                );
            }
        }
        Ok((total / solution.len() as f64, conflicts))
    }
}

pub struct TeacherWorkloadConstraint {
    state: ConstraintState,
}

impl TeacherWorkloadConstraint {
    pub fn new() -> Self {
        Self {
            state: ConstraintState::new(0.8),
        }
    }
}

impl Default for TeacherWorkloadConstraint {
    fn default() -> Self {
        Self::new()
    }
}

impl Constraint for TeacherWorkloadConstraint {
    identity!(
        5,
        "TeacherWorkload",
        "Teacher workload",
        Level4QualitySoft,
        rules::TEACHER_COMFORT
    );

    fn evaluate(
        &self,
        problem: &SchedulingProblem,
        solution: &SchedulingSolution,
    ) -> Result<Evaluated, ConstraintError> {
        let index = ProblemIndex::new(problem);
        let mut per_teacher: BTreeMap<TeacherId, Vec<&Assignment>> = BTreeMap::new();
        for a in solution.assignments() {
            per_teacher.entry(a.teacher_id).or_default().push(a);
        }
        let mut compliant = 0;
        let mut conflicts = Vec::new();
        for (teacher_id, classes) in &per_teacher {
            let teacher = index.teacher(classes[0])?;
            let weekly = classes.len() as u32 * HOURS_PER_ASSIGNMENT;
            let mut per_day: BTreeMap<u8, u32> = BTreeMap::new();
            for a in classes {
                *per_day.entry(index.timeslot(a)?.day_of_week).or_default() +=
                    HOURS_PER_ASSIGNMENT;
            }
            let busiest = per_day.values().copied().max().unwrap_or(0);
            let ok = (teacher.max_weekly_hours == 0 || weekly <= teacher.max_weekly_hours)
                && (teacher.max_daily_hours == 0 || busiest <= teacher.max_daily_hours);
            if ok {
                compliant += 1;
            } else {
                conflicts.push(
                    SchedulingConflict::new(
                        self.id(),
                        ConflictType::TeacherWorkloadExceeded,
                        ConflictSeverity::Moderate,
                        format!(
                            "{} teaches {weekly}h a week, {busiest}h on the busiest day",
                            teacher.name
                        ),
                    )
                    .with_teachers([*teacher_id]),
                );
            }
        }
        Ok((ratio(compliant, per_teacher.len()), conflicts))
    }
}

/// Rewards days whose classes run back to back.
pub struct TeacherScheduleCompactnessConstraint {
    state: ConstraintState,
    max_consecutive: u32,
}

impl TeacherScheduleCompactnessConstraint {
    pub fn new(max_consecutive: u32) -> Self {
        Self {
            state: ConstraintState::new(0.7),
            max_consecutive: max_consecutive.max(1),
        }
    }
}

impl Constraint for TeacherScheduleCompactnessConstraint {
    identity!(
        6,
        "TeacherScheduleCompactness",
        "Teacher schedule compactness",
        Level4QualitySoft,
        rules::TEACHER_COMFORT
    );

    fn evaluate(
        &self,
        problem: &SchedulingProblem,
        solution: &SchedulingSolution,
    ) -> Result<Evaluated, ConstraintError> {
        let index = ProblemIndex::new(problem);
        let days = teacher_days(&index, solution)?;
        let mut optimal = 0;
        let mut conflicts = Vec::new();
        for ((teacher, day), classes) in &days {
            let spans: Vec<(u16, u16)> = classes
                .iter()
                .map(|(_, s)| (s.start_minutes, s.end_minutes))
                .collect();
            let target = self.max_consecutive.min(classes.len() as u32);
            if longest_run(&spans) >= target {
                optimal += 1;
            } else {
                conflicts.push(
                    SchedulingConflict::new(
                        self.id(),
                        ConflictType::Other,
                        ConflictSeverity::Minor,
                        format!("{} has a scattered schedule on day {day}", classes[0].0.teacher_name),
                    )
                    .with_teachers([*teacher]),
                );
            }
        }
        Ok((ratio(optimal, days.len()), conflicts))
    }
}

/// Penalises back-to-back classes in different buildings.
pub struct TeacherMobilityConstraint {
    state: ConstraintState,
}

impl TeacherMobilityConstraint {
    pub fn new() -> Self {
        Self {
            state: ConstraintState::new(0.4),
        }
    }
}

impl Default for TeacherMobilityConstraint {
    fn default() -> Self {
        Self::new()
    }
}

impl Constraint for TeacherMobilityConstraint {
    identity!(
        12,
        "TeacherMobility",
        "Teacher mobility",
        Level4QualitySoft,
        rules::TEACHER_PREFERENCE
    );

    fn evaluate(
        &self,
        problem: &SchedulingProblem,
        solution: &SchedulingSolution,
    ) -> Result<Evaluated, ConstraintError> {
        let index = ProblemIndex::new(problem);
        let mut back_to_back = 0;
        let mut conflicts = Vec::new();
        for ((teacher, _), classes) in teacher_days(&index, solution)? {
            for pair in classes.windows(2) {
                let ((a, sa), (b, sb)) = (pair[0], pair[1]);
                let gap = sb.start_minutes as i32 - sa.end_minutes as i32;
                if !(0..=MOBILITY_GAP_MINUTES).contains(&gap) {
                    continue;
                }
                back_to_back += 1;
                let from = &index.classroom(a)?.building;
                let to = &index.classroom(b)?.building;
                if from != to {
                    conflicts.push(
                        SchedulingConflict::new(
                            self.id(),
                            ConflictType::BuildingDistanceConflict,
                            ConflictSeverity::Minor,
                            format!(
                                "{} moves from {from} to {to} with {gap} minutes between classes",
                                a.teacher_name
                            ),
                        )
                        .with_sections([a.section_id, b.section_id])
                        .with_teachers([teacher])
                        .with_timeslots([a.timeslot_id, b.timeslot_id]),
                    );
                }
            }
        }
        let score = if back_to_back == 0 {
            1.0
        } else {
            1.0 - conflicts.len() as f64 / back_to_back as f64
        };
        Ok((score, conflicts))
    }
}

/// Back-to-back classes on different campuses need `min_travel` minutes between them.
pub struct CampusTravelTimeConstraint {
    state: ConstraintState,
    min_travel: u32,
}

impl CampusTravelTimeConstraint {
    pub fn new(min_travel: u32) -> Self {
        Self {
            state: ConstraintState::new(0.5),
            min_travel,
        }
    }
}

impl Constraint for CampusTravelTimeConstraint {
    identity!(
        13,
        "CampusTravelTime",
        "Campus travel time",
        Level4QualitySoft,
        rules::RESOURCE_AVAILABILITY
    );

    fn evaluate(
        &self,
        problem: &SchedulingProblem,
        solution: &SchedulingSolution,
    ) -> Result<Evaluated, ConstraintError> {
        let index = ProblemIndex::new(problem);
        let mut tight = 0;
        let mut conflicts = Vec::new();
        for ((teacher, _), classes) in teacher_days(&index, solution)? {
            for pair in classes.windows(2) {
                let ((a, sa), (b, sb)) = (pair[0], pair[1]);
                let gap = sb.start_minutes as i32 - sa.end_minutes as i32;
                if gap < 0 || gap >= self.min_travel as i32 {
                    continue;
                }
                tight += 1;
                let from = index.classroom(a)?.campus_id;
                let to = index.classroom(b)?.campus_id;
                if from != to {
                    conflicts.push(
                        SchedulingConflict::new(
                            self.id(),
                            ConflictType::CampusTravelTimeConflict,
                            ConflictSeverity::Moderate,
                            format!(
                                "{} has {gap} minutes to travel from campus {from} to campus {to}",
                                a.teacher_name
                            ),
                        )
                        .with_sections([a.section_id, b.section_id])
                        .with_teachers([teacher])
                        .with_timeslots([a.timeslot_id, b.timeslot_id]),
                    );
                }
            }
        }
        let score = if tight == 0 {
            1.0
        } else {
            1.0 - conflicts.len() as f64 / tight as f64
        };
        Ok((score, conflicts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{raw, Fixture};
    use types::{CampusId, CourseId, TeacherCoursePreference};

    #[test]
    fn type_mismatch_lowers_score_proportionally() {
        let mut p = Fixture::new().sections(2).teachers(2).classrooms(2).timeslots(1).build();
        p.sections[0].required_room_type = Some("Lab".into());
        p.classrooms[1].room_type = "Computer Lab".into();
        let c = ClassroomTypeMatchConstraint::new();

        let wrong = raw(&p, &[(1, 1, 1, 1), (2, 2, 2, 1)]);
        let (score, conflicts) = c.evaluate(&p, &wrong).unwrap();
        assert_eq!(score, 0.5);
        assert_eq!(conflicts[0].conflict_type, ConflictType::ClassroomTypeMismatch);

        let right = raw(&p, &[(1, 1, 2, 1), (2, 2, 1, 1)]);
        assert_eq!(c.evaluate(&p, &right).unwrap().0, 1.0);
    }

    #[test]
    fn equipment_counts_only_sections_with_needs() {
        let mut p = Fixture::new().sections(3).teachers(3).classrooms(3).timeslots(1).build();
        p.sections[0].required_equipment = Some("Projector".into());
        p.sections[1].required_equipment = Some("Projector, Microscope".into());
        let s = raw(&p, &[(1, 1, 1, 1), (2, 2, 2, 1), (3, 3, 3, 1)]);
        let (score, conflicts) = EquipmentRequirementConstraint::new().evaluate(&p, &s).unwrap();
        assert_eq!(score, 0.5);
        assert_eq!(conflicts.len(), 1);
        assert!(conflicts[0].description.contains("Microscope"));
    }

    #[test]
    fn preference_scores_and_flags_dislikes() {
        let mut p = Fixture::new().sections(2).teachers(1).classrooms(2).timeslots(2).build();
        p.teacher_preferences.push(TeacherCoursePreference {
            teacher_id: TeacherId(1),
            course_id: CourseId(1),
            proficiency_level: 4,
            preference_level: 1,
        });
        let s = raw(&p, &[(1, 1, 1, 1), (2, 1, 2, 2)]);
        let (score, conflicts) = TeacherPreferenceConstraint::new().evaluate(&p, &s).unwrap();
        assert!((score - (0.2 + 0.6) / 2.0).abs() < 1e-9);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].severity, ConflictSeverity::Moderate);
    }

    #[test]
    fn workload_limits_mark_teachers() {
        let mut p = Fixture::new().sections(3).teachers(2).classrooms(3).timeslots(3).build();
        p.teachers[0].max_daily_hours = 2;
        let s = raw(&p, &[(1, 1, 1, 1), (2, 1, 2, 2), (3, 2, 3, 3)]);
        let (score, conflicts) = TeacherWorkloadConstraint::new().evaluate(&p, &s).unwrap();
        assert_eq!(score, 0.5);
        assert_eq!(conflicts[0].teachers, vec![TeacherId(1)]);
    }

    #[test]
    fn compactness_prefers_back_to_back_days() {
        let p = Fixture::new().sections(3).teachers(1).classrooms(1).timeslots(8).build();
        let c = TeacherScheduleCompactnessConstraint::new(3);
        let packed = raw(&p, &[(1, 1, 1, 1), (2, 1, 1, 2), (3, 1, 1, 3)]);
        assert_eq!(c.evaluate(&p, &packed).unwrap().0, 1.0);
        // 60 minute slots with 50 minute classes leave 10 minute gaps; skip one
        let scattered = raw(&p, &[(1, 1, 1, 1), (2, 1, 1, 3), (3, 1, 1, 5)]);
        let (score, conflicts) = c.evaluate(&p, &scattered).unwrap();
        assert_eq!(score, 0.0);
        assert_eq!(conflicts.len(), 1);
    }

    #[test]
    fn mobility_and_campus_travel() {
        let mut p = Fixture::new().sections(2).teachers(1).classrooms(2).timeslots(2).build();
        p.classrooms[1].building = "B".into();
        p.classrooms[1].campus_id = CampusId(2);
        let s = raw(&p, &[(1, 1, 1, 1), (2, 1, 2, 2)]);

        let (score, conflicts) = TeacherMobilityConstraint::new().evaluate(&p, &s).unwrap();
        assert_eq!(score, 0.0);
        assert_eq!(conflicts[0].conflict_type, ConflictType::BuildingDistanceConflict);

        let (score, conflicts) = CampusTravelTimeConstraint::new(30).evaluate(&p, &s).unwrap();
        assert_eq!(score, 0.0);
        assert_eq!(conflicts[0].conflict_type, ConflictType::CampusTravelTimeConflict);

        // ten minutes is enough when the campus rule asks for five
        assert_eq!(CampusTravelTimeConstraint::new(5).evaluate(&p, &s).unwrap().0, 1.0);
    }
}
