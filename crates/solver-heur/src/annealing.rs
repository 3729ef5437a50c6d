use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;
use types::{AlgorithmSettings, SchedulingParameters, SchedulingSolution, Score};

use sched_core::{Move, MoveGenerator, SchedulingContext, Vary};

use crate::HeurError;

/// Alternatives considered for a full reassignment move.
const REASSIGN_CANDIDATES: usize = 8;
/// Chance per temperature step of jumping back to the best solution.
const RESET_PROBABILITY: f64 = 0.1;

/// Improvements are always taken; a worse neighbour (`delta < 0`) is taken
/// with probability `exp(delta / temperature)`.
pub fn should_accept<R: Rng>(delta: f64, temperature: f64, rng: &mut R) -> bool {
    if delta >= 0.0 {
        return true;
    }
    if temperature <= 0.0 {
        return false;
    }
    rng.gen::<f64>() < (delta / temperature).exp()
}

/// One random edit: swap slots, rooms or teachers of two assignments, or
/// rebind one assignment to a generated alternative.
pub fn random_move<R: Rng>(
    ctx: &SchedulingContext<'_>,
    solution: &SchedulingSolution,
    rng: &mut R,
) -> Option<Move> {
    let all = solution.assignments();
    let a = all.choose(rng)?;
    let kind = rng.gen_range(0..4);
    if kind < 3 && all.len() >= 2 {
        let b = loop {
            let b = all.choose(rng)?;
            if b.id != a.id {
                break b;
            }
        };
        let (first, second) = (a.id, b.id);
        return Some(match kind {
            0 => Move::SwapTimeSlots { first, second },
            1 => Move::SwapClassrooms { first, second },
            _ => Move::SwapTeachers { first, second },
        });
    }
    MoveGenerator::from_context(ctx)
        .rotated(rng.gen())
        .alternatives(solution, a, Vary::All, REASSIGN_CANDIDATES)
        .choose(rng)
        .cloned()
}

/// A random move applied to a copy, or `None` when the move breaks a
/// placement rule.
fn neighbour<R: Rng>(
    ctx: &SchedulingContext<'_>,
    solution: &SchedulingSolution,
    rng: &mut R,
) -> Option<SchedulingSolution> {
    let mv = random_move(ctx, solution, rng)?;
    MoveGenerator::from_context(ctx).try_apply(solution, &mv)
}

/// Applies a random move in place. A rejected move leaves `solution` as it was.
pub fn mutate<R: Rng>(
    ctx: &SchedulingContext<'_>,
    solution: &mut SchedulingSolution,
    rng: &mut R,
) -> bool {
    match neighbour(ctx, solution, rng) {
        Some(next) => {
            *solution = next;
            true
        }
        None => false,
    }
}

/// Score change of a move. An infeasible candidate is infinitely worse, so
/// [`should_accept`] never takes it.
pub fn delta(candidate: Score, current: Score) -> f64 {
    match (candidate.value(), current.value()) {
        (None, _) => f64::NEG_INFINITY,
        (Some(c), Some(p)) => c - p,
        (Some(_), None) => f64::INFINITY,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimulatedAnnealing {
    pub initial_temperature: f64,
    pub cooling_rate: f64,
    pub iterations_per_temperature: u32,
    pub min_temperature: f64,
}

impl SimulatedAnnealing {
    pub fn from_settings(settings: &AlgorithmSettings) -> Self {
        Self {
            initial_temperature: settings.initial_temperature,
            cooling_rate: settings.cooling_rate,
            iterations_per_temperature: settings.iterations_per_temperature,
            min_temperature: settings.min_temperature,
        }
    }

    /// Local-search schedule: the run's temperature range with
    /// `max_ls_iterations` spread over a hundred steps.
    pub fn local_search(params: &SchedulingParameters) -> Self {
        Self {
            initial_temperature: params.initial_temperature,
            cooling_rate: params.cooling_rate,
            iterations_per_temperature: (params.max_ls_iterations / 100).max(1),
            min_temperature: params.final_temperature,
        }
    }

    /// Half the steps per temperature and twice the cooling speed.
    pub fn shortened(&self) -> Self {
        Self {
            iterations_per_temperature: (self.iterations_per_temperature / 2).max(1),
            cooling_rate: self.cooling_rate * self.cooling_rate,
            ..self.clone()
        }
    }

    /// Returns the best solution seen. The input is never modified.
    pub fn optimize<R: Rng>(
        &self,
        ctx: &SchedulingContext<'_>,
        solution: &SchedulingSolution,
        rng: &mut R,
    ) -> Result<SchedulingSolution, HeurError> {
        if self.initial_temperature <= self.min_temperature || solution.is_empty() {
            return Ok(solution.clone());
        }
        let cooling = self.cooling_rate.clamp(0.0, 0.9999);
        let stall_limit = 10 * self.iterations_per_temperature.max(1);

        let mut current = solution.clone();
        let mut current_score = ctx.score(&current);
        let mut best = current.clone();
        let mut best_score = current_score;
        let mut temperature = self.initial_temperature;
        let mut stalled = 0u32;
        let mut rounds = 0u32;

        while temperature > self.min_temperature && stalled < stall_limit {
            if ctx.is_cancelled() {
                return Err(HeurError::Cancelled);
            }
            let mut improved = false;
            for _ in 0..self.iterations_per_temperature {
                let Some(next) = neighbour(ctx, &current, rng) else {
                    continue;
                };
                let score = ctx.score(&next);
                if should_accept(delta(score, current_score), temperature, rng) {
                    current = next;
                    current_score = score;
                    if current_score.is_better_than(&best_score) {
                        best = current.clone();
                        best_score = current_score;
                        improved = true;
                    }
                }
            }
            stalled = if improved { 0 } else { stalled + 1 };
            if rng.gen_bool(RESET_PROBABILITY) {
                current = best.clone();
                current_score = best_score;
            }
            temperature *= cooling;
            rounds += 1;
        }
        debug!(rounds, ?best_score, "annealing finished");
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use sched_core::testing::{raw, Fixture};
    use sched_core::CancellationToken;

    #[test]
    fn acceptance_rule() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(should_accept(0.2, 0.01, &mut rng));
        assert!(!should_accept(-0.5, 0.0, &mut rng));
        let hits = (0..10_000)
            .filter(|_| should_accept(-1.0, 1.0, &mut rng))
            .count();
        let expected = (-1.0f64).exp() * 10_000.0;
        assert!((hits as f64 - expected).abs() < expected * 0.05, "{hits}");
    }

    #[test]
    fn infeasible_neighbours_are_never_taken() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let worse = delta(Score::Infeasible, Score::feasible(0.8));
        assert_eq!(worse, f64::NEG_INFINITY);
        assert!((0..1_000).all(|_| !should_accept(worse, 100.0, &mut rng)));
        assert!(!should_accept(delta(Score::Infeasible, Score::Infeasible), 100.0, &mut rng));
        assert!(should_accept(delta(Score::feasible(0.1), Score::Infeasible), 0.0, &mut rng));
        assert!((delta(Score::feasible(0.5), Score::feasible(0.8)) + 0.3).abs() < 1e-12);
    }

    #[test]
    fn cold_start_is_identity() {
        let p = Fixture::new().sections(3).teachers(2).classrooms(2).timeslots(4).build();
        let s = raw(&p, &[(1, 1, 1, 1), (2, 2, 2, 1), (3, 1, 1, 2)]);
        let ctx = SchedulingContext::new(&p, &Default::default(), CancellationToken::new());
        let sa = SimulatedAnnealing {
            initial_temperature: 0.5,
            cooling_rate: 0.9,
            iterations_per_temperature: 10,
            min_temperature: 0.5,
        };
        let out = sa.optimize(&ctx, &s, &mut ChaCha8Rng::seed_from_u64(0)).unwrap();
        assert_eq!(out.assignments(), s.assignments());
    }

    #[test]
    fn never_returns_worse_than_input() {
        let p = Fixture::new().sections(4).teachers(2).classrooms(2).timeslots(4).build();
        let s = raw(&p, &[(1, 1, 1, 1), (2, 2, 2, 1), (3, 1, 1, 2), (4, 2, 2, 2)]);
        let params = types::SchedulingParameters {
            use_enhanced_constraints: true,
            ..Default::default()
        };
        let ctx = SchedulingContext::new(&p, &params, CancellationToken::new());
        let sa = SimulatedAnnealing {
            initial_temperature: 1.0,
            cooling_rate: 0.8,
            iterations_per_temperature: 20,
            min_temperature: 0.05,
        };
        let before = ctx.score(&s);
        let out = sa.optimize(&ctx, &s, &mut ChaCha8Rng::seed_from_u64(9)).unwrap();
        assert!(!before.is_better_than(&ctx.score(&out)));
        assert!(out.is_conflict_free());
        assert_eq!(out.len(), s.len());
    }

    #[test]
    fn mutation_keeps_solution_consistent() {
        let p = Fixture::new().sections(4).teachers(3).classrooms(2).timeslots(3).build();
        let mut s = raw(&p, &[(1, 1, 1, 1), (2, 2, 2, 1), (3, 3, 1, 2), (4, 1, 2, 3)]);
        let ctx = SchedulingContext::new(&p, &Default::default(), CancellationToken::new());
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        for _ in 0..50 {
            mutate(&ctx, &mut s, &mut rng);
            assert!(s.is_conflict_free());
            assert_eq!(s.scheduled_sections().len(), 4);
        }
    }
}
