//! Atomic edits to a solution and the brute-force generator of valid ones.

use serde::{Deserialize, Serialize};
use std::fmt;
use types::{
    Assignment, AssignmentId, ClassroomId, SchedulingProblem, SchedulingSolution, SolutionError,
    TeacherId, TimeSlotId,
};

use crate::context::SchedulingContext;
use crate::manager::ConstraintManager;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Move {
    ReassignTeacher {
        assignment: AssignmentId,
        teacher: TeacherId,
    },
    ReassignClassroom {
        assignment: AssignmentId,
        classroom: ClassroomId,
    },
    ReassignTimeSlot {
        assignment: AssignmentId,
        timeslot: TimeSlotId,
    },
    Reassign {
        assignment: AssignmentId,
        teacher: TeacherId,
        classroom: ClassroomId,
        timeslot: TimeSlotId,
    },
    SwapTimeSlots {
        first: AssignmentId,
        second: AssignmentId,
    },
    SwapClassrooms {
        first: AssignmentId,
        second: AssignmentId,
    },
    SwapTeachers {
        first: AssignmentId,
        second: AssignmentId,
    },
}

fn lookup(solution: &SchedulingSolution, id: AssignmentId) -> Result<&Assignment, SolutionError> {
    solution
        .assignment(id)
        .ok_or(SolutionError::UnknownAssignment(id))
}

impl Move {
    /// Applies the move as one unit. On error the solution is unchanged.
    pub fn apply(
        &self,
        problem: &SchedulingProblem,
        solution: &mut SchedulingSolution,
    ) -> Result<(), SolutionError> {
        let replacements = match *self {
            Move::ReassignTeacher { assignment, teacher } => {
                vec![lookup(solution, assignment)?.with_teacher(problem, teacher)]
            }
            Move::ReassignClassroom {
                assignment,
                classroom,
            } => vec![lookup(solution, assignment)?.with_classroom(problem, classroom)],
            Move::ReassignTimeSlot {
                assignment,
                timeslot,
            } => vec![lookup(solution, assignment)?.with_timeslot(problem, timeslot)],
            Move::Reassign {
                assignment,
                teacher,
                classroom,
                timeslot,
            } => vec![lookup(solution, assignment)?.rebound(problem, teacher, classroom, timeslot)],
            Move::SwapTimeSlots { first, second } => {
                let (a, b) = (lookup(solution, first)?, lookup(solution, second)?);
                vec![
                    a.with_timeslot(problem, b.timeslot_id),
                    b.with_timeslot(problem, a.timeslot_id),
                ]
            }
            Move::SwapClassrooms { first, second } => {
                let (a, b) = (lookup(solution, first)?, lookup(solution, second)?);
                vec![
                    a.with_classroom(problem, b.classroom_id),
                    b.with_classroom(problem, a.classroom_id),
                ]
            }
            Move::SwapTeachers { first, second } => {
                let (a, b) = (lookup(solution, first)?, lookup(solution, second)?);
                vec![
                    a.with_teacher(problem, b.teacher_id),
                    b.with_teacher(problem, a.teacher_id),
                ]
            }
        };
        solution.try_replace(replacements)
    }

    /// Assignments whose binding the move rewrites.
    pub fn touched(&self) -> Vec<AssignmentId> {
        match *self {
            Move::ReassignTeacher { assignment, .. }
            | Move::ReassignClassroom { assignment, .. }
            | Move::ReassignTimeSlot { assignment, .. }
            | Move::Reassign { assignment, .. } => vec![assignment],
            Move::SwapTimeSlots { first, second }
            | Move::SwapClassrooms { first, second }
            | Move::SwapTeachers { first, second } => vec![first, second],
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Move::ReassignTeacher { assignment, teacher } => {
                write!(f, "give assignment {assignment} to teacher {teacher}")
            }
            Move::ReassignClassroom {
                assignment,
                classroom,
            } => write!(f, "move assignment {assignment} to classroom {classroom}"),
            Move::ReassignTimeSlot {
                assignment,
                timeslot,
            } => write!(f, "move assignment {assignment} to timeslot {timeslot}"),
            Move::Reassign {
                assignment,
                teacher,
                classroom,
                timeslot,
            } => write!(
                f,
                "rebind assignment {assignment} to teacher {teacher}, classroom {classroom}, timeslot {timeslot}"
            ),
            Move::SwapTimeSlots { first, second } => {
                write!(f, "swap timeslots of assignments {first} and {second}")
            }
            Move::SwapClassrooms { first, second } => {
                write!(f, "swap classrooms of assignments {first} and {second}")
            }
            Move::SwapTeachers { first, second } => {
                write!(f, "swap teachers of assignments {first} and {second}")
            }
        }
    }
}

/// Which part of a binding the generator may change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Vary {
    TimeSlot,
    Teacher,
    Classroom,
    All,
}

/// Enumerates timeslot × teacher × classroom replacements for one assignment
/// and keeps those the constraint manager accepts.
pub struct MoveGenerator<'a> {
    manager: &'a ConstraintManager,
    problem: &'a SchedulingProblem,
    rotate: usize,
}

impl<'a> MoveGenerator<'a> {
    pub fn new(manager: &'a ConstraintManager, problem: &'a SchedulingProblem) -> Self {
        Self {
            manager,
            problem,
            rotate: 0,
        }
    }

    pub fn from_context(ctx: &'a SchedulingContext<'_>) -> Self {
        Self::new(&ctx.manager, ctx.problem)
    }

    /// Starts enumeration `by` positions into each candidate list, so callers
    /// with a small `limit` still see different parts of the space.
    pub fn rotated(mut self, by: usize) -> Self {
        self.rotate = by;
        self
    }

    fn candidates<T: Copy>(&self, all: Vec<T>, current: T, vary: bool) -> Vec<T> {
        if !vary || all.is_empty() {
            return vec![current];
        }
        let mut all = all;
        let n = all.len();
        all.rotate_left(self.rotate % n);
        all
    }

    /// Applies `mv` to a copy of `solution` and keeps it only if every
    /// rewritten assignment still passes the replacement checks against the
    /// rest of the result.
    pub fn try_apply(&self, solution: &SchedulingSolution, mv: &Move) -> Option<SchedulingSolution> {
        let mut next = solution.clone();
        mv.apply(self.problem, &mut next).ok()?;
        let valid = mv.touched().into_iter().all(|id| {
            next.assignment(id).is_some_and(|a| {
                self.manager
                    .is_valid_replacement(self.problem, &next, a, a)
            })
        });
        valid.then_some(next)
    }

    /// At most `limit` valid moves for `assignment`.
    pub fn alternatives(
        &self,
        solution: &SchedulingSolution,
        assignment: &Assignment,
        vary: Vary,
        limit: usize,
    ) -> Vec<Move> {
        let any = vary == Vary::All;
        let slots = self.candidates(
            self.problem.usable_timeslots().iter().map(|t| t.id).collect(),
            assignment.timeslot_id,
            any || vary == Vary::TimeSlot,
        );
        let teachers = self.candidates(
            self.problem.teachers.iter().map(|t| t.id).collect(),
            assignment.teacher_id,
            any || vary == Vary::Teacher,
        );
        let rooms = self.candidates(
            self.problem.classrooms.iter().map(|c| c.id).collect(),
            assignment.classroom_id,
            any || vary == Vary::Classroom,
        );

        let mut moves = Vec::new();
        for &timeslot in &slots {
            for &teacher in &teachers {
                for &classroom in &rooms {
                    if moves.len() >= limit {
                        return moves;
                    }
                    let candidate = assignment.rebound(self.problem, teacher, classroom, timeslot);
                    if candidate.same_binding(assignment)
                        || !self
                            .manager
                            .is_valid_replacement(self.problem, solution, assignment, &candidate)
                    {
                        continue;
                    }
                    let id = assignment.id;
                    moves.push(match vary {
                        Vary::TimeSlot => Move::ReassignTimeSlot {
                            assignment: id,
                            timeslot,
                        },
                        Vary::Teacher => Move::ReassignTeacher {
                            assignment: id,
                            teacher,
                        },
                        Vary::Classroom => Move::ReassignClassroom {
                            assignment: id,
                            classroom,
                        },
                        Vary::All => Move::Reassign {
                            assignment: id,
                            teacher,
                            classroom,
                            timeslot,
                        },
                    });
                }
            }
        }
        moves
    }
}
