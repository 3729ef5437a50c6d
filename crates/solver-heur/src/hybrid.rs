use std::collections::BTreeSet;

use rand::seq::index::sample;
use rand::Rng;
use tracing::{debug, info};
use types::{AlgorithmSettings, Assignment, AssignmentId, SchedulingSolution, Score, SectionId};

use sched_core::SchedulingContext;

use crate::annealing::{mutate, SimulatedAnnealing};
use crate::diversity::average_difference;
use crate::HeurError;

const DIVERSITY_INTERVAL: u32 = 5;
const DIVERSITY_SAMPLE: usize = 10;
const DIVERSITY_THRESHOLD: f64 = 0.1;
const FULL_POLISH_INTERVAL: u32 = 10;

#[derive(Clone)]
struct Member {
    solution: SchedulingSolution,
    score: Score,
}

impl Member {
    fn scored(ctx: &SchedulingContext<'_>, solution: SchedulingSolution) -> Self {
        let score = ctx.score(&solution);
        Self { solution, score }
    }
}

fn rank(population: &mut [Member]) {
    population.sort_by(|a, b| b.score.total_cmp(&a.score));
}

fn tournament<'m, R: Rng>(population: &'m [Member], k: usize, rng: &mut R) -> &'m Member {
    let mut best = &population[rng.gen_range(0..population.len())];
    for _ in 1..k {
        let c = &population[rng.gen_range(0..population.len())];
        if c.score.is_better_than(&best.score) {
            best = c;
        }
    }
    best
}

/// Unit of inheritance: a lone section, or a whole cross-listed group so its
/// members keep sharing slot and room.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Gene {
    Section(SectionId),
    Group(u32),
}

fn gene_of(x: &Assignment) -> Gene {
    x.cross_listed_group
        .map_or(Gene::Section(x.section_id), Gene::Group)
}

/// Copies every assignment of `gene` from `parent` into `child`, all or none.
fn inherit(child: &mut SchedulingSolution, parent: &SchedulingSolution, gene: Gene) -> bool {
    let mut trial = child.clone();
    let mut copied = false;
    for x in parent.assignments().iter().filter(|x| gene_of(x) == gene) {
        let mut x = x.clone();
        x.id = AssignmentId(0);
        if trial.add_assignment(x).is_err() {
            return false;
        }
        copied = true;
    }
    if copied {
        *child = trial;
    }
    copied
}

/// One-point crossover over the sorted union of genes. Genes before the cut
/// come from `a`, the rest from `b`; when the chosen parent's assignments
/// collide with what is already placed the other parent's are tried.
pub fn crossover<R: Rng>(
    a: &SchedulingSolution,
    b: &SchedulingSolution,
    rng: &mut R,
) -> SchedulingSolution {
    let genes: Vec<Gene> = a
        .assignments()
        .iter()
        .chain(b.assignments())
        .map(gene_of)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let cut = rng.gen_range(0..=genes.len());

    let mut child = SchedulingSolution::new(a.id, a.problem_id);
    child.algorithm = a.algorithm.clone();
    child.constraint_level = a.constraint_level;
    for (i, gene) in genes.into_iter().enumerate() {
        let (first, second) = if i < cut { (a, b) } else { (b, a) };
        if !inherit(&mut child, first, gene) && !inherit(&mut child, second, gene) {
            debug!(?gene, "crossover dropped gene");
        }
    }
    child.renumber();
    child
}

/// Genetic search over whole solutions with annealing as the local step.
#[derive(Clone, Debug)]
pub struct HybridOptimizer {
    pub settings: AlgorithmSettings,
}

impl HybridOptimizer {
    pub fn new(settings: AlgorithmSettings) -> Self {
        Self { settings }
    }

    pub fn optimize<R: Rng>(
        &self,
        ctx: &SchedulingContext<'_>,
        solution: &SchedulingSolution,
        rng: &mut R,
    ) -> Result<SchedulingSolution, HeurError> {
        let cfg = &self.settings;
        let size = cfg.population_size.max(2);
        let elites = cfg.elitism_count.min(size);
        let full = SimulatedAnnealing::from_settings(cfg);
        let short = full.shortened();

        let mut population = self.seed(ctx, solution, &full, size, rng)?;
        rank(&mut population);
        let mut best = population[0].clone();

        for generation in 0..cfg.max_generations {
            if ctx.is_cancelled() {
                return Err(HeurError::Cancelled);
            }
            rank(&mut population);
            if population[0].score.is_better_than(&best.score) {
                best = population[0].clone();
            }

            if generation > 0 && generation % DIVERSITY_INTERVAL == 0 {
                self.restore_diversity(ctx, &mut population, &best, rng);
            }
            if generation > 0 && generation % FULL_POLISH_INTERVAL == 0 {
                let polished = Member::scored(ctx, full.optimize(ctx, &best.solution, rng)?);
                if polished.score.is_better_than(&best.score) {
                    best = polished.clone();
                    if let Some(worst) = population.last_mut() {
                        *worst = polished;
                    }
                }
            }

            let polish_chance =
                0.1 + 0.5 * f64::from(generation) / f64::from(cfg.max_generations.max(1));
            let polish_cap = size / 3;
            let mut polished = 0usize;
            let k = (size / 5).max(2);

            let mut next: Vec<Member> = population[..elites].to_vec();
            while next.len() < size {
                let p1 = tournament(&population, k, rng);
                let p2 = tournament(&population, k, rng);
                let mut child = if rng.gen_bool(cfg.crossover_rate.clamp(0.0, 1.0)) {
                    crossover(&p1.solution, &p2.solution, rng)
                } else {
                    p1.solution.clone()
                };
                if rng.gen_bool(cfg.mutation_rate.clamp(0.0, 1.0)) {
                    mutate(ctx, &mut child, rng);
                }
                let mut child = Member::scored(ctx, child);
                if polished < polish_cap && rng.gen_bool(polish_chance.min(1.0)) {
                    polished += 1;
                    let candidate = Member::scored(ctx, short.optimize(ctx, &child.solution, rng)?);
                    if candidate.score.is_better_than(&child.score) {
                        child = candidate;
                    }
                }
                next.push(child);
            }
            population = next;
            debug!(generation, best = ?best.score, "generation done");
        }

        rank(&mut population);
        if population[0].score.is_better_than(&best.score) {
            best = population[0].clone();
        }
        let last = Member::scored(ctx, full.optimize(ctx, &best.solution, rng)?);
        if last.score.is_better_than(&best.score) {
            best = last;
        }
        info!(score = ?best.score, "hybrid search finished");
        Ok(best.solution)
    }

    fn seed<R: Rng>(
        &self,
        ctx: &SchedulingContext<'_>,
        solution: &SchedulingSolution,
        sa: &SimulatedAnnealing,
        size: usize,
        rng: &mut R,
    ) -> Result<Vec<Member>, HeurError> {
        let mut population = vec![
            Member::scored(ctx, solution.clone()),
            Member::scored(ctx, sa.optimize(ctx, solution, rng)?),
        ];
        while population.len() < size {
            let mut variant = solution.clone();
            mutate(ctx, &mut variant, rng);
            population.push(Member::scored(ctx, variant));
        }
        Ok(population)
    }

    /// Replaces the worst members with heavily mutated copies of the best
    /// when a sample of the population has converged.
    fn restore_diversity<R: Rng>(
        &self,
        ctx: &SchedulingContext<'_>,
        population: &mut [Member],
        best: &Member,
        rng: &mut R,
    ) {
        let n = population.len();
        let picks = sample(rng, n, n.min(DIVERSITY_SAMPLE));
        let sampled: Vec<_> = picks.iter().map(|i| &population[i].solution).collect();
        let diversity = average_difference(&sampled);
        if diversity >= DIVERSITY_THRESHOLD {
            return;
        }
        let replace = (n / 10).max(3).min(n.saturating_sub(self.settings.elitism_count.min(n)));
        debug!(diversity, replace, "population converged, injecting variants");
        for member in population.iter_mut().rev().take(replace) {
            let mut variant = best.solution.clone();
            for _ in 0..rng.gen_range(5..=15) {
                mutate(ctx, &mut variant, rng);
            }
            *member = Member::scored(ctx, variant);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use sched_core::testing::{raw, Fixture};
    use sched_core::CancellationToken;
    use types::SchedulingParameters;

    fn small_settings() -> AlgorithmSettings {
        AlgorithmSettings {
            initial_temperature: 1.0,
            cooling_rate: 0.7,
            iterations_per_temperature: 5,
            min_temperature: 0.1,
            population_size: 8,
            crossover_rate: 0.8,
            mutation_rate: 0.5,
            max_generations: 12,
            elitism_count: 2,
        }
    }

    #[test]
    fn crossover_keeps_invariant() {
        let p = Fixture::new().sections(4).teachers(2).classrooms(2).timeslots(4).build();
        let a = raw(&p, &[(1, 1, 1, 1), (2, 2, 2, 1), (3, 1, 1, 2), (4, 2, 2, 2)]);
        let b = raw(&p, &[(1, 1, 1, 2), (2, 2, 2, 2), (3, 1, 1, 1), (4, 2, 2, 1)]);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..20 {
            let child = crossover(&a, &b, &mut rng);
            assert!(child.is_conflict_free());
            assert_eq!(child.scheduled_sections().len(), 4);
            let ids: Vec<_> = child.assignments().iter().map(|x| x.id.0).collect();
            assert_eq!(ids, vec![1, 2, 3, 4]);
        }
    }

    #[test]
    fn crossover_moves_cross_listed_groups_whole() {
        let mut p = Fixture::new().sections(4).teachers(4).classrooms(3).timeslots(4).build();
        p.sections[0].cross_listed_group = Some(5);
        p.sections[1].cross_listed_group = Some(5);
        let a = raw(&p, &[(1, 1, 1, 1), (2, 2, 1, 1), (3, 3, 2, 2), (4, 4, 3, 3)]);
        let b = raw(&p, &[(1, 1, 2, 3), (2, 2, 2, 3), (3, 3, 1, 1), (4, 4, 3, 4)]);
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        for _ in 0..30 {
            let child = crossover(&a, &b, &mut rng);
            let x = child.for_section(SectionId(1)).next().unwrap();
            let y = child.for_section(SectionId(2)).next().unwrap();
            assert_eq!((x.timeslot_id, x.classroom_id), (y.timeslot_id, y.classroom_id));
            assert!(child.is_conflict_free());
        }
    }

    #[test]
    fn hybrid_does_not_regress() {
        let p = Fixture::new().sections(5).teachers(3).classrooms(2).timeslots(6).build();
        let s = raw(&p, &[(1, 1, 1, 1), (2, 2, 2, 1), (3, 3, 1, 2), (4, 1, 2, 3), (5, 2, 1, 4)]);
        let params = SchedulingParameters {
            use_enhanced_constraints: true,
            ..Default::default()
        };
        let ctx = SchedulingContext::new(&p, &params, CancellationToken::new());
        let before = ctx.score(&s);
        let out = HybridOptimizer::new(small_settings())
            .optimize(&ctx, &s, &mut ChaCha8Rng::seed_from_u64(11))
            .unwrap();
        assert!(!before.is_better_than(&ctx.score(&out)));
        assert!(out.is_conflict_free());
    }

    #[test]
    fn cancelled_run_stops() {
        let p = Fixture::new().sections(2).teachers(2).classrooms(2).timeslots(2).build();
        let s = raw(&p, &[(1, 1, 1, 1), (2, 2, 2, 1)]);
        let cancel = CancellationToken::new();
        let ctx = SchedulingContext::new(&p, &Default::default(), cancel.clone());
        cancel.cancel();
        let err = HybridOptimizer::new(small_settings())
            .optimize(&ctx, &s, &mut ChaCha8Rng::seed_from_u64(0))
            .unwrap_err();
        assert!(matches!(err, HeurError::Cancelled));
    }
}
