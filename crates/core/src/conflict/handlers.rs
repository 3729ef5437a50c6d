use types::{
    Assignment, ConflictType, SchedulingConflict, SchedulingSolution, TimeSlotId,
};

use super::{ConflictHandler, ConflictResolutionOption};
use crate::context::SchedulingContext;
use crate::moves::{Move, MoveGenerator, Vary};

const TIME_MOVES_PER_ASSIGNMENT: usize = 5;
const MAX_TEACHER_OPTIONS: usize = 8;
const ROOM_MOVES_PER_ASSIGNMENT: usize = 5;
const ROOM_HANDLER_TIME_MOVES: usize = 3;

/// Current assignments of the sections a conflict names.
fn involved<'s>(
    conflict: &SchedulingConflict,
    solution: &'s SchedulingSolution,
) -> Vec<&'s Assignment> {
    conflict
        .sections
        .iter()
        .flat_map(|id| solution.for_section(*id))
        .collect()
}

/// A timeslot swap between `moving` and some assignment elsewhere that
/// actually applies to `solution`.
fn swap_partner(
    ctx: &SchedulingContext<'_>,
    solution: &SchedulingSolution,
    moving: &Assignment,
    busy: TimeSlotId,
) -> Option<Move> {
    solution
        .assignments()
        .iter()
        .filter(|other| other.timeslot_id != busy && other.teacher_id != moving.teacher_id)
        .map(|other| Move::SwapTimeSlots {
            first: moving.id,
            second: other.id,
        })
        .find(|mv| MoveGenerator::from_context(ctx).try_apply(solution, mv).is_some())
}

fn options_from(
    moves: Vec<Move>,
    compatibility: u8,
    describe: impl Fn(&Move) -> String,
) -> impl Iterator<Item = ConflictResolutionOption> {
    moves
        .into_iter()
        .map(move |mv| ConflictResolutionOption::new(describe(&mv), compatibility, vec![mv]))
}

/// One teacher booked twice in a slot.
pub struct TeacherConflictHandler;

impl ConflictHandler for TeacherConflictHandler {
    fn conflict_type(&self) -> ConflictType {
        ConflictType::TeacherConflict
    }

    fn resolution_options(
        &self,
        ctx: &SchedulingContext<'_>,
        conflict: &SchedulingConflict,
        solution: &SchedulingSolution,
    ) -> Vec<ConflictResolutionOption> {
        let assignments = involved(conflict, solution);
        let still_clashing = assignments.iter().enumerate().any(|(i, a)| {
            assignments[i + 1..]
                .iter()
                .any(|b| a.teacher_id == b.teacher_id && a.timeslot_id == b.timeslot_id)
        });
        if !still_clashing {
            return Vec::new();
        }

        let gen = MoveGenerator::from_context(ctx);
        let mut options = Vec::new();
        for a in &assignments {
            let moves = gen.alternatives(solution, a, Vary::TimeSlot, TIME_MOVES_PER_ASSIGNMENT);
            options.extend(options_from(moves, 80, |mv| {
                format!("Move {} to another time ({mv})", a.section_code)
            }));
        }
        for a in &assignments {
            let room = MAX_TEACHER_OPTIONS.saturating_sub(options.len());
            if room == 0 {
                break;
            }
            let moves = gen.alternatives(solution, a, Vary::Teacher, room);
            options.extend(options_from(moves, 70, |mv| {
                format!("Give {} to another teacher ({mv})", a.section_code)
            }));
        }
        if let [first, second] = assignments.as_slice() {
            options.push(ConflictResolutionOption::new(
                format!("Swap the times of {} and {}", first.section_code, second.section_code),
                90,
                vec![Move::SwapTimeSlots {
                    first: first.id,
                    second: second.id,
                }],
            ));
            if let Some(mv) = swap_partner(ctx, solution, second, second.timeslot_id) {
                options.push(ConflictResolutionOption::new(
                    format!("Swap the time of {} with another class", second.section_code),
                    90,
                    vec![mv],
                ));
            }
        }
        options
    }
}

/// One classroom booked twice in a slot.
pub struct ClassroomConflictHandler;

impl ConflictHandler for ClassroomConflictHandler {
    fn conflict_type(&self) -> ConflictType {
        ConflictType::ClassroomConflict
    }

    fn resolution_options(
        &self,
        ctx: &SchedulingContext<'_>,
        conflict: &SchedulingConflict,
        solution: &SchedulingSolution,
    ) -> Vec<ConflictResolutionOption> {
        let assignments = involved(conflict, solution);
        let still_clashing = assignments.iter().enumerate().any(|(i, a)| {
            assignments[i + 1..].iter().any(|b| {
                a.classroom_id == b.classroom_id
                    && a.timeslot_id == b.timeslot_id
                    && !a.shares_room_with(b)
            })
        });
        if !still_clashing {
            return Vec::new();
        }

        let gen = MoveGenerator::from_context(ctx);
        let mut options = Vec::new();
        for a in &assignments {
            let moves = gen.alternatives(solution, a, Vary::Classroom, ROOM_MOVES_PER_ASSIGNMENT);
            options.extend(options_from(moves, 90, |mv| {
                format!("Move {} to another room ({mv})", a.section_code)
            }));
            let moves = gen.alternatives(solution, a, Vary::TimeSlot, ROOM_HANDLER_TIME_MOVES);
            options.extend(options_from(moves, 70, |mv| {
                format!("Move {} to another time ({mv})", a.section_code)
            }));
        }
        if let [_, second] = assignments.as_slice() {
            if let Some(mv) = swap_partner(ctx, solution, second, second.timeslot_id) {
                options.push(ConflictResolutionOption::new(
                    format!("Swap the time of {} with another class", second.section_code),
                    85,
                    vec![mv],
                ));
            }
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CancellationToken;
    use crate::testing::{raw, Fixture};
    use types::{ConflictSeverity, SchedulingParameters, SectionId};

    fn conflict(kind: ConflictType, sections: [u32; 2]) -> SchedulingConflict {
        SchedulingConflict::new(1, kind, ConflictSeverity::Critical, "clash")
            .with_sections(sections.map(SectionId))
    }

    #[test]
    fn teacher_options_are_capped_and_include_swap() {
        let p = Fixture::new().sections(3).teachers(3).classrooms(3).timeslots(8).build();
        let s = raw(&p, &[(1, 1, 1, 1), (2, 1, 2, 1), (3, 2, 3, 2)]);
        let ctx = SchedulingContext::new(&p, &SchedulingParameters::default(), CancellationToken::new());
        let options = TeacherConflictHandler.resolution_options(
            &ctx,
            &conflict(ConflictType::TeacherConflict, [1, 2]),
            &s,
        );
        let time_moves = options.iter().filter(|o| o.compatibility == 80).count();
        assert_eq!(time_moves, 10);
        assert!(options.iter().any(|o| o.compatibility == 90));
        assert!(options.iter().all(|o| o.actions.len() == 1 && !o.impacts.is_empty()));
    }

    #[test]
    fn lone_teacher_clash_still_offers_direct_swap() {
        let p = Fixture::new().sections(2).teachers(1).classrooms(2).timeslots(1).build();
        let s = raw(&p, &[(1, 1, 1, 1), (2, 1, 2, 1)]);
        let ctx = SchedulingContext::new(&p, &SchedulingParameters::default(), CancellationToken::new());
        let options = TeacherConflictHandler.resolution_options(
            &ctx,
            &conflict(ConflictType::TeacherConflict, [1, 2]),
            &s,
        );
        let (a1, a2) = (s.assignments()[0].id, s.assignments()[1].id);
        let direct = options
            .iter()
            .find(|o| o.actions == [Move::SwapTimeSlots { first: a1, second: a2 }])
            .expect("direct swap offered");
        assert_eq!(direct.compatibility, 90);
    }

    #[test]
    fn resolved_conflict_yields_no_options() {
        let p = Fixture::new().sections(2).teachers(2).classrooms(2).timeslots(2).build();
        let s = raw(&p, &[(1, 1, 1, 1), (2, 2, 1, 2)]);
        let ctx = SchedulingContext::new(&p, &SchedulingParameters::default(), CancellationToken::new());
        for handler in [
            &TeacherConflictHandler as &dyn ConflictHandler,
            &ClassroomConflictHandler,
        ] {
            let c = conflict(handler.conflict_type(), [1, 2]);
            assert!(handler.resolution_options(&ctx, &c, &s).is_empty());
        }
    }

    #[test]
    fn room_clash_prefers_room_moves() {
        let p = Fixture::new().sections(2).teachers(2).classrooms(3).timeslots(2).build();
        let s = raw(&p, &[(1, 1, 1, 1), (2, 2, 1, 1)]);
        let ctx = SchedulingContext::new(&p, &SchedulingParameters::default(), CancellationToken::new());
        let c = conflict(ConflictType::ClassroomConflict, [1, 2]);
        let fixed = ClassroomConflictHandler.resolve_batch(&ctx, &[c], &s).unwrap();
        assert!(fixed.is_conflict_free());
        // both sections keep their slot; one of them changed room
        assert!(fixed.assignments().iter().all(|a| a.timeslot_id == types::TimeSlotId(1)));
    }
}
