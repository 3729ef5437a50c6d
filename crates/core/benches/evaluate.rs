use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sched_core::testing::Fixture;
use sched_core::{CancellationToken, SchedulingContext};
use types::{
    Assignment, ClassroomId, SchedulingParameters, SchedulingSolution, SectionId, SolutionId,
    TeacherId, TimeSlotId,
};

/// 60 sections spread over 10 teachers, 12 rooms and a 40 slot week.
fn dense_solution(problem: &types::SchedulingProblem) -> SchedulingSolution {
    // id 0 bypasses the score cache, so every iteration evaluates from scratch
    let mut solution = SchedulingSolution::new(SolutionId(0), problem.id);
    for i in 0..60u32 {
        let a = Assignment::new(
            problem,
            SectionId(i + 1),
            TeacherId(i % 10 + 1),
            ClassroomId(i % 12 + 1),
            TimeSlotId(i / 2 + 1),
        );
        let _ = solution.add_assignment(a);
    }
    solution
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let problem = Fixture::new()
        .sections(60)
        .teachers(10)
        .classrooms(12)
        .timeslots(40)
        .build();
    let params = SchedulingParameters {
        use_enhanced_constraints: true,
        ..Default::default()
    };
    let ctx = SchedulingContext::new(&problem, &params, CancellationToken::new());
    let solution = dense_solution(&problem);

    c.bench_function("evaluate_60_sections", |b| {
        b.iter(|| ctx.evaluate(black_box(&solution)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
