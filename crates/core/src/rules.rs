//! Placement checks shared by the greedy builder and the move generator.
//!
//! These read the display fields (`building`, `day_of_week`, minutes) that
//! `Assignment::new` fills in, so they are cheap enough to run per candidate.

use types::{
    Assignment, AssignmentId, Classroom, CourseSection, SchedulingProblem, SchedulingSolution,
    Teacher,
};

/// Hours a single assignment counts towards a teacher's load.
pub const HOURS_PER_ASSIGNMENT: u32 = 2;

/// Gaps up to this many minutes still count as back-to-back teaching.
pub const CONSECUTIVE_GAP_MINUTES: i32 = 15;

pub fn room_type_satisfies(room_type: &str, required: &str) -> bool {
    room_type
        .to_ascii_lowercase()
        .contains(&required.to_ascii_lowercase())
}

/// Type, capacity and equipment fit for `enrollment` students of `section`.
pub fn room_fits(room: &Classroom, section: &CourseSection, enrollment: u32) -> bool {
    room.capacity >= enrollment
        && section
            .room_type_requirement()
            .map_or(true, |req| room_type_satisfies(&room.room_type, req))
        && room.has_all_equipment(section)
}

/// Preference record, same department, or cross-department teaching allowed.
pub fn teacher_qualified(
    problem: &SchedulingProblem,
    teacher: &Teacher,
    section: &CourseSection,
) -> bool {
    problem.preference(teacher.id, section.course_id).is_some()
        || teacher.department_id == section.department_id
        || problem.settings.allow_cross_department_teaching
}

/// A restricted section next to a differently restricted one in the same
/// building and slot.
pub fn gender_clash(
    problem: &SchedulingProblem,
    solution: &SchedulingSolution,
    candidate: &Assignment,
    ignore: Option<AssignmentId>,
) -> bool {
    if !problem.settings.enable_gender_segregation {
        return false;
    }
    let Some(gender) = problem.section(candidate.section_id).and_then(|s| s.gender()) else {
        return false;
    };
    solution.for_timeslot(candidate.timeslot_id).any(|other| {
        Some(other.id) != ignore
            && other.building == candidate.building
            && problem
                .section(other.section_id)
                .and_then(|s| s.gender())
                .map_or(false, |g| !g.eq_ignore_ascii_case(gender))
    })
}

/// Another member of `candidate`'s cross-listed group sits in a different
/// slot or room.
pub fn splits_cross_listed_group(
    solution: &SchedulingSolution,
    candidate: &Assignment,
    ignore: Option<AssignmentId>,
) -> bool {
    let Some(group) = candidate.cross_listed_group else {
        return false;
    };
    solution.assignments().iter().any(|other| {
        Some(other.id) != ignore
            && other.section_id != candidate.section_id
            && other.cross_listed_group == Some(group)
            && (other.timeslot_id != candidate.timeslot_id
                || other.classroom_id != candidate.classroom_id)
    })
}

/// Weekly or daily hour limit broken once `candidate` is added.
pub fn workload_exceeded(
    teacher: &Teacher,
    solution: &SchedulingSolution,
    candidate: &Assignment,
    ignore: Option<AssignmentId>,
) -> bool {
    let mut weekly = 0;
    let mut daily = 0;
    for a in solution.for_teacher(teacher.id) {
        if Some(a.id) == ignore {
            continue;
        }
        weekly += 1;
        if a.day_of_week == candidate.day_of_week {
            daily += 1;
        }
    }
    let over = |count: u32, limit: u32| limit > 0 && (count + 1) * HOURS_PER_ASSIGNMENT > limit;
    over(weekly, teacher.max_weekly_hours) || over(daily, teacher.max_daily_hours)
}

/// Longest run of back-to-back classes once `candidate` joins the teacher's day.
pub fn consecutive_run(
    solution: &SchedulingSolution,
    candidate: &Assignment,
    ignore: Option<AssignmentId>,
) -> u32 {
    let mut spans: Vec<(u16, u16)> = solution
        .for_teacher(candidate.teacher_id)
        .filter(|a| Some(a.id) != ignore && a.day_of_week == candidate.day_of_week)
        .map(|a| (a.start_minutes, a.end_minutes))
        .collect();
    spans.push((candidate.start_minutes, candidate.end_minutes));
    spans.sort_unstable();
    longest_run(&spans)
}

/// Spans must be sorted by start.
pub fn longest_run(spans: &[(u16, u16)]) -> u32 {
    if spans.is_empty() {
        return 0;
    }
    let mut best = 1;
    let mut run = 1;
    for w in spans.windows(2) {
        let gap = w[1].0 as i32 - w[0].1 as i32;
        if gap <= CONSECUTIVE_GAP_MINUTES {
            run += 1;
            best = best.max(run);
        } else {
            run = 1;
        }
    }
    best
}
