use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    AssignmentId, ClassroomId, ConstraintLevel, SchedulingEvaluation, SchedulingProblem,
    SectionId, SolutionId, TeacherId, TimeSlotId,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SolutionError {
    #[error("teacher {teacher} is already teaching in timeslot {timeslot}")]
    TeacherDoubleBooked {
        teacher: TeacherId,
        timeslot: TimeSlotId,
    },
    #[error("classroom {classroom} is already booked in timeslot {timeslot}")]
    ClassroomDoubleBooked {
        classroom: ClassroomId,
        timeslot: TimeSlotId,
    },
    #[error("assignment {0} does not exist")]
    UnknownAssignment(AssignmentId),
    #[error("assignment id {0} is used twice")]
    DuplicateId(AssignmentId),
}

pub fn default_week_pattern() -> Vec<u8> {
    (1..=14).collect()
}

/// One section bound to a teacher, a classroom and a timeslot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: AssignmentId,
    pub section_id: SectionId,
    pub teacher_id: TeacherId,
    pub classroom_id: ClassroomId,
    pub timeslot_id: TimeSlotId,
    #[serde(default = "default_week_pattern")]
    pub week_pattern: Vec<u8>,
    /// Set for sections of a cross-listed group; such assignments may share a classroom.
    #[serde(default)]
    pub cross_listed_group: Option<u32>,
    #[serde(default)]
    pub section_code: String,
    #[serde(default)]
    pub teacher_name: String,
    #[serde(default)]
    pub classroom_name: String,
    #[serde(default)]
    pub building: String,
    #[serde(default)]
    pub day_of_week: u8,
    #[serde(default)]
    pub start_minutes: u16,
    #[serde(default)]
    pub end_minutes: u16,
}

impl Assignment {
    /// Builds an unnumbered binding; `SchedulingSolution::add_assignment` gives it an id.
    pub fn new(
        problem: &SchedulingProblem,
        section_id: SectionId,
        teacher_id: TeacherId,
        classroom_id: ClassroomId,
        timeslot_id: TimeSlotId,
    ) -> Self {
        let mut a = Self {
            id: AssignmentId(0),
            section_id,
            teacher_id,
            classroom_id,
            timeslot_id,
            week_pattern: default_week_pattern(),
            cross_listed_group: None,
            section_code: String::new(),
            teacher_name: String::new(),
            classroom_name: String::new(),
            building: String::new(),
            day_of_week: 0,
            start_minutes: 0,
            end_minutes: 0,
        };
        a.refresh(problem);
        a
    }

    /// Re-reads the display fields from the problem after an id changed.
    pub fn refresh(&mut self, problem: &SchedulingProblem) {
        if let Some(s) = problem.section(self.section_id) {
            self.section_code = s.code.clone();
            self.cross_listed_group = s
                .cross_listed_group
                .filter(|_| problem.settings.allow_cross_listed_courses);
        }
        if let Some(t) = problem.teacher(self.teacher_id) {
            self.teacher_name = t.name.clone();
        }
        if let Some(c) = problem.classroom(self.classroom_id) {
            self.classroom_name = c.name.clone();
            self.building = c.building.clone();
        }
        if let Some(ts) = problem.timeslot(self.timeslot_id) {
            self.day_of_week = ts.day_of_week;
            self.start_minutes = ts.start_minutes;
            self.end_minutes = ts.end_minutes;
        }
    }

    pub fn rebound(
        &self,
        problem: &SchedulingProblem,
        teacher_id: TeacherId,
        classroom_id: ClassroomId,
        timeslot_id: TimeSlotId,
    ) -> Self {
        let mut a = self.clone();
        a.teacher_id = teacher_id;
        a.classroom_id = classroom_id;
        a.timeslot_id = timeslot_id;
        a.refresh(problem);
        a
    }

    pub fn with_teacher(&self, problem: &SchedulingProblem, teacher_id: TeacherId) -> Self {
        self.rebound(problem, teacher_id, self.classroom_id, self.timeslot_id)
    }

    pub fn with_classroom(&self, problem: &SchedulingProblem, classroom_id: ClassroomId) -> Self {
        self.rebound(problem, self.teacher_id, classroom_id, self.timeslot_id)
    }

    pub fn with_timeslot(&self, problem: &SchedulingProblem, timeslot_id: TimeSlotId) -> Self {
        self.rebound(problem, self.teacher_id, self.classroom_id, timeslot_id)
    }

    pub fn same_binding(&self, other: &Assignment) -> bool {
        self.teacher_id == other.teacher_id
            && self.classroom_id == other.classroom_id
            && self.timeslot_id == other.timeslot_id
    }

    pub fn shares_room_with(&self, other: &Assignment) -> bool {
        matches!(
            (self.cross_listed_group, other.cross_listed_group),
            (Some(a), Some(b)) if a == b
        )
    }

    fn clash(&self, other: &Assignment) -> Option<SolutionError> {
        if self.timeslot_id != other.timeslot_id {
            return None;
        }
        if self.teacher_id == other.teacher_id {
            return Some(SolutionError::TeacherDoubleBooked {
                teacher: self.teacher_id,
                timeslot: self.timeslot_id,
            });
        }
        if self.classroom_id == other.classroom_id && !self.shares_room_with(other) {
            return Some(SolutionError::ClassroomDoubleBooked {
                classroom: self.classroom_id,
                timeslot: self.timeslot_id,
            });
        }
        None
    }
}

/// A timetable under construction. Checked mutators keep it free of teacher
/// and classroom double bookings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingSolution {
    pub id: SolutionId,
    #[serde(default)]
    pub problem_id: u32,
    #[serde(default)]
    pub algorithm: String,
    #[serde(default)]
    pub constraint_level: Option<ConstraintLevel>,
    assignments: Vec<Assignment>,
    #[serde(default)]
    pub evaluation: Option<SchedulingEvaluation>,
}

impl SchedulingSolution {
    pub fn new(id: SolutionId, problem_id: u32) -> Self {
        Self {
            id,
            problem_id,
            ..Default::default()
        }
    }

    /// Takes assignments as given, without conflict checks. Meant for auditing
    /// timetables produced elsewhere.
    pub fn from_raw(id: SolutionId, problem_id: u32, assignments: Vec<Assignment>) -> Self {
        Self {
            id,
            problem_id,
            assignments,
            ..Default::default()
        }
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn assignment(&self, id: AssignmentId) -> Option<&Assignment> {
        self.assignments.iter().find(|a| a.id == id)
    }

    pub fn next_assignment_id(&self) -> AssignmentId {
        AssignmentId(self.assignments.iter().map(|a| a.id.0).max().unwrap_or(0) + 1)
    }

    /// Appends `a`, numbering it when its id is 0. Rejects double bookings.
    pub fn add_assignment(&mut self, mut a: Assignment) -> Result<AssignmentId, SolutionError> {
        if a.id.0 == 0 {
            a.id = self.next_assignment_id();
        } else if self.assignment(a.id).is_some() {
            return Err(SolutionError::DuplicateId(a.id));
        }
        if let Some(err) = self.assignments.iter().find_map(|b| a.clash(b)) {
            return Err(err);
        }
        let id = a.id;
        self.assignments.push(a);
        Ok(id)
    }

    pub fn remove_assignment(&mut self, id: AssignmentId) -> Option<Assignment> {
        let pos = self.assignments.iter().position(|a| a.id == id)?;
        Some(self.assignments.remove(pos))
    }

    /// Swaps in new versions of existing assignments (matched by id) as one unit.
    /// Either every replacement lands or the solution is left untouched.
    pub fn try_replace(&mut self, replacements: Vec<Assignment>) -> Result<(), SolutionError> {
        let mut positions = Vec::with_capacity(replacements.len());
        for r in &replacements {
            let Some(pos) = self.assignments.iter().position(|a| a.id == r.id) else {
                return Err(SolutionError::UnknownAssignment(r.id));
            };
            if positions.contains(&pos) {
                return Err(SolutionError::DuplicateId(r.id));
            }
            positions.push(pos);
        }
        for (i, r) in replacements.iter().enumerate() {
            let kept = self
                .assignments
                .iter()
                .enumerate()
                .filter(|(j, _)| !positions.contains(j))
                .map(|(_, a)| a);
            if let Some(err) = kept.chain(&replacements[i + 1..]).find_map(|b| r.clash(b)) {
                return Err(err);
            }
        }
        for (pos, r) in positions.into_iter().zip(replacements) {
            self.assignments[pos] = r;
        }
        Ok(())
    }

    pub fn for_section(&self, id: SectionId) -> impl Iterator<Item = &Assignment> {
        self.assignments.iter().filter(move |a| a.section_id == id)
    }

    pub fn for_teacher(&self, id: TeacherId) -> impl Iterator<Item = &Assignment> {
        self.assignments.iter().filter(move |a| a.teacher_id == id)
    }

    pub fn for_classroom(&self, id: ClassroomId) -> impl Iterator<Item = &Assignment> {
        self.assignments.iter().filter(move |a| a.classroom_id == id)
    }

    pub fn for_timeslot(&self, id: TimeSlotId) -> impl Iterator<Item = &Assignment> {
        self.assignments.iter().filter(move |a| a.timeslot_id == id)
    }

    pub fn has_teacher_conflict(
        &self,
        teacher: TeacherId,
        slot: TimeSlotId,
        ignore: Option<AssignmentId>,
    ) -> bool {
        self.assignments
            .iter()
            .any(|a| a.teacher_id == teacher && a.timeslot_id == slot && Some(a.id) != ignore)
    }

    pub fn has_classroom_conflict(
        &self,
        classroom: ClassroomId,
        slot: TimeSlotId,
        ignore: Option<AssignmentId>,
    ) -> bool {
        self.assignments
            .iter()
            .any(|a| a.classroom_id == classroom && a.timeslot_id == slot && Some(a.id) != ignore)
    }

    pub fn is_conflict_free(&self) -> bool {
        let mut teacher_slots = HashSet::new();
        let mut room_slots: HashMap<(ClassroomId, TimeSlotId), Option<u32>> = HashMap::new();
        self.assignments.iter().all(|a| {
            if !teacher_slots.insert((a.teacher_id, a.timeslot_id)) {
                return false;
            }
            match room_slots.entry((a.classroom_id, a.timeslot_id)) {
                Entry::Vacant(v) => {
                    v.insert(a.cross_listed_group);
                    true
                }
                Entry::Occupied(o) => o.get().is_some() && *o.get() == a.cross_listed_group,
            }
        })
    }

    pub fn scheduled_sections(&self) -> HashSet<SectionId> {
        self.assignments.iter().map(|a| a.section_id).collect()
    }

    /// Keeps the first assignment of every section. Returns how many were dropped.
    pub fn dedupe_sections(&mut self) -> usize {
        let before = self.assignments.len();
        let mut seen = HashSet::new();
        self.assignments.retain(|a| seen.insert(a.section_id));
        before - self.assignments.len()
    }

    pub fn renumber(&mut self) {
        for (i, a) in self.assignments.iter_mut().enumerate() {
            a.id = AssignmentId(i as u32 + 1);
        }
    }

    /// Content hash of the bindings. Two solutions with the same id but
    /// different fingerprints must not share cached scores.
    pub fn fingerprint(&self) -> u64 {
        let mut h = DefaultHasher::new();
        for a in &self.assignments {
            (a.id, a.section_id, a.teacher_id, a.classroom_id, a.timeslot_id).hash(&mut h);
        }
        h.finish()
    }
}
