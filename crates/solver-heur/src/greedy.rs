//! Randomised greedy construction of a first timetable.

use rand::seq::SliceRandom;
use rand::Rng;
use std::cmp::Reverse;
use std::collections::HashSet;
use tracing::{debug, info, warn};
use types::{
    Assignment, Classroom, ClassroomId, ConflictResolutionStrategy, CourseSection,
    SchedulingSolution, SectionId, SolutionId, Teacher, TimeSlot, TimeSlotId,
};

use sched_core::rules;
use sched_core::{ConflictResolver, SchedulingContext};

use crate::HeurError;

/// Successful placements between two in-flight repair checks.
const REPAIR_INTERVAL: usize = 10;

pub struct GreedyOutcome {
    pub solution: SchedulingSolution,
    pub failed_sections: Vec<SectionId>,
}

pub struct GreedyGenerator<'c, 'p> {
    ctx: &'c SchedulingContext<'p>,
    resolver: ConflictResolver,
    strategy: ConflictResolutionStrategy,
    repair: bool,
}

impl<'c, 'p> GreedyGenerator<'c, 'p> {
    pub fn new(ctx: &'c SchedulingContext<'p>, strategy: ConflictResolutionStrategy) -> Self {
        Self {
            ctx,
            resolver: ConflictResolver::default(),
            strategy,
            repair: true,
        }
    }

    /// Turns off the periodic repair pass.
    pub fn without_repair(mut self) -> Self {
        self.repair = false;
        self
    }

    /// Construction order: special requirements, then enrollment, then
    /// cross-listed sections, ties broken at random.
    fn ordered_sections<R: Rng>(&self, rng: &mut R) -> Vec<&'p CourseSection> {
        let cross_listed = self.ctx.problem.settings.allow_cross_listed_courses;
        let mut keyed: Vec<_> = self
            .ctx
            .problem
            .sections
            .iter()
            .map(|s| {
                let key = (
                    Reverse(s.has_special_requirement()),
                    Reverse(s.enrollment),
                    Reverse(cross_listed && s.cross_listed_group.is_some()),
                    rng.gen::<u64>(),
                );
                (key, s)
            })
            .collect();
        keyed.sort_by_key(|(key, _)| *key);
        keyed.into_iter().map(|(_, s)| s).collect()
    }

    /// Preferred teachers first, then the section's department, then anyone
    /// when cross-department teaching is allowed. Each tier is shuffled.
    fn candidate_teachers<R: Rng>(&self, section: &CourseSection, rng: &mut R) -> Vec<&'p Teacher> {
        let problem = self.ctx.problem;
        let mut preferred = Vec::new();
        let mut department = Vec::new();
        let mut others = Vec::new();
        for t in &problem.teachers {
            if problem.preference(t.id, section.course_id).is_some() {
                preferred.push(t);
            } else if t.department_id == section.department_id {
                department.push(t);
            } else if problem.settings.allow_cross_department_teaching {
                others.push(t);
            }
        }
        for tier in [&mut preferred, &mut department, &mut others] {
            tier.shuffle(rng);
        }
        preferred.extend(department);
        preferred.extend(others);
        preferred
    }

    fn candidate_rooms<R: Rng>(
        &self,
        sections: &[&CourseSection],
        enrollment: u32,
        rng: &mut R,
    ) -> Vec<&'p Classroom> {
        let mut rooms: Vec<_> = self
            .ctx
            .problem
            .classrooms
            .iter()
            .filter(|c| sections.iter().all(|s| rules::room_fits(c, s, enrollment)))
            .collect();
        rooms.shuffle(rng);
        rooms
    }

    fn candidate_slots<R: Rng>(&self, rng: &mut R) -> Vec<&'p TimeSlot> {
        let mut slots = self.ctx.problem.usable_timeslots();
        slots.shuffle(rng);
        slots
    }

    /// Rooms in the teacher's home building first, when configured.
    fn rooms_for<'r>(&self, teacher: &Teacher, rooms: &'r [&'p Classroom]) -> Vec<&'r &'p Classroom> {
        let mut ordered: Vec<_> = rooms.iter().collect();
        if self.ctx.problem.settings.prioritize_home_buildings {
            if let Some(home) = teacher.preferred_building.as_deref() {
                ordered.sort_by_key(|c| c.building != home);
            }
        }
        ordered
    }

    fn room_free(&self, solution: &SchedulingSolution, room: ClassroomId, slot: TimeSlotId) -> bool {
        !solution.has_classroom_conflict(room, slot, None)
            && !(self.ctx.manager.is_active(201) && self.ctx.problem.classroom_unavailable(room, slot))
    }

    fn teacher_fits(
        &self,
        solution: &SchedulingSolution,
        teacher: &Teacher,
        candidate: &Assignment,
    ) -> bool {
        let problem = self.ctx.problem;
        let max_consecutive = problem.settings.maximum_consecutive_classes;
        !solution.has_teacher_conflict(teacher.id, candidate.timeslot_id, None)
            && !(self.ctx.manager.is_active(202)
                && problem.teacher_unavailable(teacher.id, candidate.timeslot_id))
            && !rules::workload_exceeded(teacher, solution, candidate, None)
            && !(max_consecutive > 0
                && rules::consecutive_run(solution, candidate, None) > max_consecutive)
    }

    fn admissible(
        &self,
        solution: &SchedulingSolution,
        teacher: &Teacher,
        candidate: &Assignment,
    ) -> bool {
        self.room_free(solution, candidate.classroom_id, candidate.timeslot_id)
            && self.teacher_fits(solution, teacher, candidate)
            && !(self.ctx.manager.is_active(203)
                && rules::gender_clash(self.ctx.problem, solution, candidate, None))
    }

    /// All members of a cross-listed group share one room and slot, each with
    /// its own teacher. Either every member lands or none does.
    fn place_group<R: Rng>(
        &self,
        solution: &mut SchedulingSolution,
        members: &[&'p CourseSection],
        rng: &mut R,
    ) -> bool {
        let problem = self.ctx.problem;
        let pools: Vec<Vec<&Teacher>> = members
            .iter()
            .map(|s| {
                self.candidate_teachers(s, rng)
                    .into_iter()
                    .filter(|t| rules::teacher_qualified(problem, t, s))
                    .collect()
            })
            .collect();
        let combined: u32 = members.iter().map(|s| s.enrollment).sum();
        let rooms = self.candidate_rooms(members, combined, rng);
        let slots = self.candidate_slots(rng);

        for slot in &slots {
            for room in &rooms {
                if !self.room_free(solution, room.id, slot.id) {
                    continue;
                }
                let mut trial = solution.clone();
                let mut used = HashSet::new();
                let placed = members.iter().zip(&pools).all(|(section, pool)| {
                    let chosen = pool.iter().find_map(|t| {
                        if used.contains(&t.id) {
                            return None;
                        }
                        let a = Assignment::new(problem, section.id, t.id, room.id, slot.id);
                        (self.teacher_fits(&trial, t, &a)
                            && !(self.ctx.manager.is_active(203)
                                && rules::gender_clash(problem, &trial, &a, None)))
                        .then_some(a)
                    });
                    match chosen {
                        Some(a) => {
                            used.insert(a.teacher_id);
                            trial.add_assignment(a).is_ok()
                        }
                        None => false,
                    }
                });
                if placed {
                    *solution = trial;
                    return true;
                }
            }
        }
        false
    }

    fn place_single<R: Rng>(
        &self,
        solution: &mut SchedulingSolution,
        section: &CourseSection,
        rng: &mut R,
    ) -> bool {
        let problem = self.ctx.problem;
        let teachers = self.candidate_teachers(section, rng);
        let rooms = self.candidate_rooms(&[section], section.enrollment, rng);
        let slots = self.candidate_slots(rng);

        for teacher in teachers {
            let rooms = self.rooms_for(teacher, &rooms);
            for slot in &slots {
                for room in &rooms {
                    let a = Assignment::new(problem, section.id, teacher.id, room.id, slot.id);
                    if self.admissible(solution, teacher, &a) && solution.add_assignment(a).is_ok() {
                        return true;
                    }
                }
            }
        }
        false
    }

    fn repair(&self, solution: SchedulingSolution) -> Result<SchedulingSolution, HeurError> {
        if !self.repair || self.ctx.score(&solution).is_feasible() {
            return Ok(solution);
        }
        debug!(assignments = solution.len(), "partial solution infeasible, repairing");
        Ok(self.resolver.resolve(self.ctx, &solution, self.strategy)?)
    }

    /// Builds one solution. Sections that fit nowhere are reported, not fatal.
    pub fn generate<R: Rng>(
        &self,
        id: SolutionId,
        rng: &mut R,
    ) -> Result<GreedyOutcome, HeurError> {
        let problem = self.ctx.problem;
        let mut solution = SchedulingSolution::new(id, problem.id);
        solution.algorithm = "Greedy".into();
        solution.constraint_level = Some(self.ctx.manager.level());

        let mut done: HashSet<SectionId> = HashSet::new();
        let mut failed = Vec::new();
        let mut placed = 0usize;

        if problem.settings.allow_cross_listed_courses {
            let mut groups: Vec<_> = problem.cross_listed_groups().into_values().collect();
            groups.shuffle(rng);
            for members in groups {
                if self.ctx.is_cancelled() {
                    return Err(HeurError::Cancelled);
                }
                done.extend(members.iter().map(|s| s.id));
                if self.place_group(&mut solution, &members, rng) {
                    placed += members.len();
                } else {
                    warn!(sections = members.len(), "cross-listed group could not be placed");
                    failed.extend(members.iter().map(|s| s.id));
                }
            }
        }

        for section in self.ordered_sections(rng) {
            if done.contains(&section.id) {
                continue;
            }
            if self.ctx.is_cancelled() {
                return Err(HeurError::Cancelled);
            }
            if self.place_single(&mut solution, section, rng) {
                placed += 1;
                if placed % REPAIR_INTERVAL == 0 {
                    solution = self.repair(solution)?;
                }
            } else {
                warn!(section = %section.code, "no feasible placement");
                failed.push(section.id);
            }
        }

        info!(
            solution = %id,
            assigned = solution.len(),
            failed = failed.len(),
            "greedy construction finished"
        );
        Ok(GreedyOutcome {
            solution,
            failed_sections: failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use sched_core::testing::Fixture;
    use sched_core::CancellationToken;
    use types::{SchedulingParameters, TeacherAvailability, TeacherId, TimeSlotId};

    fn run(problem: &types::SchedulingProblem, seed: u64) -> GreedyOutcome {
        let ctx = SchedulingContext::new(problem, &SchedulingParameters::default(), CancellationToken::new());
        GreedyGenerator::new(&ctx, ConflictResolutionStrategy::Hybrid)
            .generate(SolutionId(1), &mut ChaCha8Rng::seed_from_u64(seed))
            .unwrap()
    }

    #[test]
    fn roomy_problem_is_fully_scheduled() {
        let p = Fixture::new().sections(10).teachers(4).classrooms(3).timeslots(8).build();
        let out = run(&p, 7);
        assert!(out.failed_sections.is_empty());
        assert_eq!(out.solution.len(), 10);
        assert!(out.solution.is_conflict_free());
    }

    #[test]
    fn same_seed_same_solution() {
        let p = Fixture::new().sections(6).teachers(3).classrooms(2).timeslots(6).build();
        assert_eq!(run(&p, 3).solution, run(&p, 3).solution);
    }

    #[test]
    fn overflow_is_reported_not_fatal() {
        let p = Fixture::new().sections(3).teachers(1).classrooms(1).timeslots(2).build();
        let out = run(&p, 1);
        assert_eq!(out.solution.len(), 2);
        assert_eq!(out.failed_sections.len(), 1);
    }

    #[test]
    fn unavailable_slots_are_avoided() {
        let mut p = Fixture::new().sections(1).teachers(1).classrooms(1).timeslots(2).build();
        p.teacher_availability.push(TeacherAvailability {
            teacher_id: TeacherId(1),
            timeslot_id: TimeSlotId(1),
            is_available: false,
            preference_level: 0,
        });
        for seed in 0..5 {
            let out = run(&p, seed);
            assert_eq!(out.solution.assignments()[0].timeslot_id, TimeSlotId(2));
        }
    }

    #[test]
    fn cancelled_token_stops_construction() {
        let p = Fixture::new().sections(2).teachers(1).classrooms(1).timeslots(2).build();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = SchedulingContext::new(&p, &SchedulingParameters::default(), cancel);
        let res = GreedyGenerator::new(&ctx, ConflictResolutionStrategy::Hybrid)
            .generate(SolutionId(1), &mut ChaCha8Rng::seed_from_u64(0));
        assert!(matches!(res, Err(HeurError::Cancelled)));
    }
}
