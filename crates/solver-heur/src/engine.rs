use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use async_trait::async_trait;
use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};
use types::{
    LocalSearch, ScheduleRequest, SchedulingParameters, SchedulingProblem, SchedulingResult,
    SchedulingSolution, SchedulingStatistics, SchedulingStatus, SolutionId, SolutionSummary,
};

use sched_core::{CancellationToken, ConflictResolver, SchedulingContext, Solver};

use crate::analyzer::ProblemAnalyzer;
use crate::annealing::{mutate, SimulatedAnnealing};
use crate::diversity::diversify;
use crate::greedy::GreedyGenerator;
use crate::hybrid::HybridOptimizer;
use crate::HeurError;

/// Share of assignments re-mutated when padding the solution set.
const VARIANT_MUTATION_SHARE: usize = 5;

/// Greedy construction, diversification and optional local search, with a
/// Basic-level fallback when the main pipeline fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct SchedulingEngine {
    analyzer: ProblemAnalyzer,
}

#[async_trait]
impl Solver for SchedulingEngine {
    async fn solve(
        &self,
        request: ScheduleRequest,
        cancel: CancellationToken,
    ) -> anyhow::Result<SchedulingResult> {
        Ok(self.generate_schedule(&request, &cancel))
    }
}

impl SchedulingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always produces a result; failures are reported through its status.
    pub fn generate_schedule(
        &self,
        request: &ScheduleRequest,
        cancel: &CancellationToken,
    ) -> SchedulingResult {
        let started = Instant::now();
        let problem = &request.problem;
        let features = self.analyzer.analyze(problem);
        info!(
            sections = features.section_count,
            complexity = features.complexity,
            "scheduling started"
        );
        let params = request
            .parameters
            .clone()
            .unwrap_or_else(|| self.analyzer.recommend_parameters(&features));

        if let Err(e) = sched_core::validate(problem) {
            warn!(error = %e, "problem rejected");
            return SchedulingResult {
                status: SchedulingStatus::Failure,
                message: e.to_string(),
                execution_time_ms: elapsed_ms(started),
                statistics: base_statistics(problem),
                ..Default::default()
            };
        }

        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let first = guarded(|| self.pipeline(problem, &params, cancel, &mut rng));
        let outcome = self.recover(first, problem, &params, cancel, &mut rng);

        let mut result = match outcome {
            Ok(result) => result,
            Err(HeurError::Cancelled) => SchedulingResult {
                status: SchedulingStatus::Cancelled,
                message: HeurError::Cancelled.to_string(),
                statistics: base_statistics(problem),
                ..Default::default()
            },
            Err(e) => SchedulingResult::error(e.to_string(), 0),
        };
        result.execution_time_ms = elapsed_ms(started);
        info!(
            status = ?result.status,
            solutions = result.solutions.len(),
            ms = result.execution_time_ms,
            "scheduling finished"
        );
        result
    }

    fn pipeline(
        &self,
        problem: &SchedulingProblem,
        params: &SchedulingParameters,
        cancel: &CancellationToken,
        rng: &mut ChaCha8Rng,
    ) -> Result<SchedulingResult, HeurError> {
        let ctx = SchedulingContext::new(problem, params, cancel.clone());
        let target = params.target_solution_count();
        let starts = params.initial_solution_count.max(target).max(3);
        let generator = GreedyGenerator::new(&ctx, params.conflict_resolution_strategy);

        let mut candidates = Vec::with_capacity(starts);
        for i in 0..starts {
            let mut outcome = generator.generate(SolutionId(i as u32 + 1), rng)?;
            let dropped = outcome.solution.dedupe_sections();
            if dropped > 0 {
                warn!(dropped, "duplicate section assignments removed");
            }
            candidates.push(outcome.solution);
        }
        candidates.sort_by(|a, b| ctx.score(b).total_cmp(&ctx.score(a)));

        let mut solutions = diversify(candidates, params.min_solution_difference, target);
        let distinct = solutions.len();
        let mut source = 0;
        while solutions.len() < target {
            let mut variant = solutions[source % distinct].clone();
            let edits = (variant.len() / VARIANT_MUTATION_SHARE).max(1);
            for _ in 0..edits {
                mutate(&ctx, &mut variant, rng);
            }
            variant.algorithm = format!("{}-Variant", variant.algorithm);
            solutions.push(variant);
            source += 1;
        }
        for (i, s) in solutions.iter_mut().enumerate() {
            s.id = SolutionId(i as u32 + 1);
        }

        let resolver = ConflictResolver::default();
        for solution in &mut solutions {
            if params.enable_local_search {
                let mut refined = match params.local_search {
                    LocalSearch::Annealing => {
                        SimulatedAnnealing::local_search(params).optimize(&ctx, solution, rng)?
                    }
                    LocalSearch::Hybrid => HybridOptimizer::new(params.algorithm.clone())
                        .optimize(&ctx, solution, rng)?,
                };
                if ctx.is_better(&refined, solution) {
                    let label = match params.local_search {
                        LocalSearch::Annealing => "SA",
                        LocalSearch::Hybrid => "Hybrid",
                    };
                    refined.algorithm = format!("{}+{label}", solution.algorithm);
                    *solution = refined;
                }
            }
            if !ctx.score(solution).is_feasible() {
                let fixed = resolver.resolve(&ctx, solution, params.conflict_resolution_strategy)?;
                if ctx.is_better(&fixed, solution) {
                    *solution = fixed;
                }
            }
            solution.evaluation = Some(ctx.evaluate(solution));
        }
        solutions.sort_by(|a, b| ctx.score(b).total_cmp(&ctx.score(a)));

        let statistics = statistics(problem, &solutions, params);
        let best_feasible = solutions.first().is_some_and(|s| ctx.score(s).is_feasible());
        let (status, message) = if solutions.is_empty() {
            (SchedulingStatus::Failure, "no solution could be generated".to_string())
        } else if best_feasible && statistics.unscheduled_sections == 0 {
            (
                SchedulingStatus::Success,
                format!("generated {} solution(s)", solutions.len()),
            )
        } else {
            (
                SchedulingStatus::PartialSuccess,
                format!(
                    "best solution leaves {} section(s) unscheduled{}",
                    statistics.unscheduled_sections,
                    if best_feasible { "" } else { " and violates hard constraints" }
                ),
            )
        };
        Ok(SchedulingResult {
            status,
            solutions,
            message,
            execution_time_ms: 0,
            statistics,
        })
    }

    /// Any failure other than cancellation gets one emergency retry.
    fn recover(
        &self,
        outcome: Result<SchedulingResult, HeurError>,
        problem: &SchedulingProblem,
        params: &SchedulingParameters,
        cancel: &CancellationToken,
        rng: &mut ChaCha8Rng,
    ) -> Result<SchedulingResult, HeurError> {
        match outcome {
            Err(e) if !matches!(e, HeurError::Cancelled) => {
                warn!(error = %e, "pipeline failed, retrying at Basic level");
                guarded(|| self.emergency(problem, params, cancel, rng, &e.to_string()))
            }
            other => other,
        }
    }

    /// Basic level, no in-flight repair, no local search.
    fn emergency(
        &self,
        problem: &SchedulingProblem,
        params: &SchedulingParameters,
        cancel: &CancellationToken,
        rng: &mut impl Rng,
        cause: &str,
    ) -> Result<SchedulingResult, HeurError> {
        let basic = SchedulingParameters {
            use_basic_constraints: true,
            ..params.clone()
        };
        let ctx = SchedulingContext::new(problem, &basic, cancel.clone());
        let generator = GreedyGenerator::new(&ctx, basic.conflict_resolution_strategy).without_repair();
        let mut solutions = Vec::new();
        for i in 0..basic.target_solution_count() {
            let mut solution = generator.generate(SolutionId(i as u32 + 1), rng)?.solution;
            solution.dedupe_sections();
            solution.algorithm = format!("Emergency-Random-{}", i + 1);
            solution.evaluation = Some(ctx.evaluate(&solution));
            solutions.push(solution);
        }
        Ok(SchedulingResult {
            status: SchedulingStatus::PartialSuccess,
            statistics: statistics(problem, &solutions, &basic),
            solutions,
            message: format!("emergency fallback at Basic level after: {cause}"),
            execution_time_ms: 0,
        })
    }
}

/// Runs `f`, turning a panic into [`HeurError::Panicked`].
fn guarded<T>(f: impl FnOnce() -> Result<T, HeurError>) -> Result<T, HeurError> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(HeurError::Panicked(message))
    })
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn base_statistics(problem: &SchedulingProblem) -> SchedulingStatistics {
    SchedulingStatistics {
        total_sections: problem.sections.len(),
        unscheduled_sections: problem.sections.len(),
        total_teachers: problem.teachers.len(),
        total_classrooms: problem.classrooms.len(),
        ..Default::default()
    }
}

/// Section counts describe the first (best) solution.
fn statistics(
    problem: &SchedulingProblem,
    solutions: &[SchedulingSolution],
    params: &SchedulingParameters,
) -> SchedulingStatistics {
    let scheduled = solutions.first().map_or(0, |s| s.scheduled_sections().len());
    SchedulingStatistics {
        scheduled_sections: scheduled,
        unscheduled_sections: problem.sections.len().saturating_sub(scheduled),
        constraint_level: Some(params.constraint_level()),
        solutions: solutions
            .iter()
            .map(|s| SolutionSummary {
                solution_id: s.id,
                algorithm: s.algorithm.clone(),
                score: s
                    .evaluation
                    .as_ref()
                    .map_or(types::Score::Infeasible, |e| e.score),
                assigned_sections: s.scheduled_sections().len(),
                conflict_count: s.evaluation.as_ref().map_or(0, |e| e.conflicts.len()),
            })
            .collect(),
        ..base_statistics(problem)
    }
}
