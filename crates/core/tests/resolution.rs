use proptest::prelude::*;
use sched_core::{CancellationToken, ConflictResolver, SchedulingContext};
use serde_json::json;
use types::{
    Assignment, AssignmentId, ClassroomId, ConflictResolutionStrategy, SchedulingParameters,
    SchedulingProblem, SchedulingSolution, SectionId, SolutionId, TeacherId, TimeSlotId,
};

fn problem() -> SchedulingProblem {
    let sections: Vec<_> = (1..=6)
        .map(|i| json!({ "id": i, "courseId": i, "code": format!("C{i}"), "enrollment": 25 }))
        .collect();
    let teachers: Vec<_> = (1..=3).map(|i| json!({ "id": i, "name": format!("T{i}") })).collect();
    let classrooms: Vec<_> = (1..=3)
        .map(|i| json!({ "id": i, "name": format!("R{i}"), "building": "Main", "capacity": 30 }))
        .collect();
    let timeslots: Vec<_> = (1..=6)
        .map(|i| {
            json!({
                "id": i,
                "dayOfWeek": 1 + (i - 1) / 3,
                "startMinutes": 480 + ((i - 1) % 3) * 120,
                "endMinutes": 570 + ((i - 1) % 3) * 120,
            })
        })
        .collect();
    serde_json::from_value(json!({
        "id": 7,
        "sections": sections,
        "teachers": teachers,
        "classrooms": classrooms,
        "timeslots": timeslots,
    }))
    .unwrap()
}

/// Pairs of assignments double booking a teacher or a room.
fn clashing_pairs(s: &SchedulingSolution) -> usize {
    let all = s.assignments();
    let mut n = 0;
    for (i, a) in all.iter().enumerate() {
        for b in &all[i + 1..] {
            let same_slot = a.timeslot_id == b.timeslot_id;
            if same_slot && (a.teacher_id == b.teacher_id || a.classroom_id == b.classroom_id) {
                n += 1;
            }
        }
    }
    n
}

fn raw(problem: &SchedulingProblem, binds: &[(u32, u32, u32)]) -> SchedulingSolution {
    let assignments = binds
        .iter()
        .enumerate()
        .map(|(i, &(t, c, ts))| {
            let mut a = Assignment::new(
                problem,
                SectionId(i as u32 + 1),
                TeacherId(t),
                ClassroomId(c),
                TimeSlotId(ts),
            );
            a.id = AssignmentId(i as u32 + 1);
            a
        })
        .collect();
    SchedulingSolution::from_raw(SolutionId(1), problem.id, assignments)
}

#[test]
fn wire_problem_parses_with_defaults() {
    let p = problem();
    assert_eq!(p.sections.len(), 6);
    assert_eq!(p.timeslots[4].day_of_week, 2);
    assert!(p.timeslots.iter().all(|t| t.is_regular()));
    assert!(p.settings.enable_gender_segregation);
    sched_core::validate(&p).unwrap();
}

#[test]
fn hybrid_repairs_a_crowded_slot() {
    let p = problem();
    let ctx = SchedulingContext::new(&p, &SchedulingParameters::default(), CancellationToken::new());
    let crowded = raw(&p, &[(1, 1, 1), (1, 2, 1), (2, 2, 1), (3, 3, 2)]);
    assert!(!ctx.score(&crowded).is_feasible());

    let fixed = ConflictResolver::default()
        .resolve(&ctx, &crowded, ConflictResolutionStrategy::Hybrid)
        .unwrap();
    assert_eq!(clashing_pairs(&fixed), 0);
    assert!(ctx.score(&fixed).is_feasible());
    assert_eq!(fixed.scheduled_sections(), crowded.scheduled_sections());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn resolution_never_adds_double_bookings(
        binds in prop::collection::vec((1u32..=3, 1u32..=3, 1u32..=6), 1..=6),
        strategy in prop::sample::select(vec![
            ConflictResolutionStrategy::Sequential,
            ConflictResolutionStrategy::Holistic,
            ConflictResolutionStrategy::Hybrid,
        ]),
    ) {
        let p = problem();
        let ctx = SchedulingContext::new(&p, &SchedulingParameters::default(), CancellationToken::new());
        let input = raw(&p, &binds);
        let snapshot = input.clone();

        let out = ConflictResolver::default().resolve(&ctx, &input, strategy).unwrap();

        prop_assert_eq!(&input, &snapshot);
        prop_assert!(clashing_pairs(&out) <= clashing_pairs(&input));
        prop_assert_eq!(out.len(), input.len());
    }
}
