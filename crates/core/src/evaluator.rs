use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tracing::trace;
use types::{
    ConstraintEvaluation, ConstraintHierarchy, SchedulingEvaluation, SchedulingProblem,
    SchedulingSolution, Score, SolutionId,
};

use crate::constraints::Constraint;
use crate::manager::{evaluate_constraint, weighted_average, ConstraintManager};

/// Solutions remembered by the score cache.
pub const CACHE_CAPACITY: usize = 100;

/// Solution id plus the fingerprint of its bindings. Neighbours that share
/// an id get separate entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    id: SolutionId,
    fingerprint: u64,
}

impl CacheKey {
    /// `None` for id 0, which is never cached.
    pub fn of(solution: &SchedulingSolution) -> Option<Self> {
        (solution.id.0 != 0).then(|| Self {
            id: solution.id,
            fingerprint: solution.fingerprint(),
        })
    }
}

/// Per-constraint results, least recently used first out.
#[derive(Default)]
pub struct ScoreCache {
    inner: Mutex<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<CacheKey, HashMap<u32, ConstraintEvaluation>>,
    recency: VecDeque<CacheKey>,
    hits: u64,
}

impl CacheInner {
    fn touch(&mut self, key: CacheKey) {
        if let Some(pos) = self.recency.iter().position(|k| *k == key) {
            self.recency.remove(pos);
        }
        self.recency.push_back(key);
        while self.recency.len() > CACHE_CAPACITY {
            if let Some(old) = self.recency.pop_front() {
                self.entries.remove(&old);
            }
        }
    }
}

impl ScoreCache {
    pub fn get(&self, key: CacheKey, constraint: &dyn Constraint) -> Option<ConstraintEvaluation> {
        let mut inner = self.inner.lock();
        let mut hit = inner.entries.get(&key)?.get(&constraint.id())?.clone();
        hit.weight = constraint.weight();
        inner.hits += 1;
        inner.touch(key);
        Some(hit)
    }

    pub fn put(&self, key: CacheKey, eval: &ConstraintEvaluation) {
        let mut inner = self.inner.lock();
        inner
            .entries
            .entry(key)
            .or_default()
            .insert(eval.constraint_id, eval.clone());
        inner.touch(key);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> u64 {
        self.inner.lock().hits
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.recency.clear();
    }
}

/// Turns constraint scores into a single comparable [`Score`].
pub struct SolutionEvaluator {
    physical_weight: f64,
    quality_weight: f64,
    cache: ScoreCache,
}

impl SolutionEvaluator {
    pub fn new(physical_weight: f64, quality_weight: f64) -> Self {
        Self {
            physical_weight,
            quality_weight,
            cache: ScoreCache::default(),
        }
    }

    pub fn cache(&self) -> &ScoreCache {
        &self.cache
    }

    fn evaluate_one(
        &self,
        key: Option<CacheKey>,
        constraint: &dyn Constraint,
        problem: &SchedulingProblem,
        solution: &SchedulingSolution,
    ) -> ConstraintEvaluation {
        let Some(key) = key else {
            return evaluate_constraint(constraint, problem, solution);
        };
        if let Some(hit) = self.cache.get(key, constraint) {
            return hit;
        }
        let eval = evaluate_constraint(constraint, problem, solution);
        self.cache.put(key, &eval);
        eval
    }

    /// Hard constraints first; any hard score below 1.0 makes the solution
    /// infeasible and skips the soft pass.
    pub fn evaluate(
        &self,
        manager: &ConstraintManager,
        problem: &SchedulingProblem,
        solution: &SchedulingSolution,
    ) -> SchedulingEvaluation {
        let key = CacheKey::of(solution);
        let hard: Vec<ConstraintEvaluation> = manager
            .active()
            .filter(|c| c.is_hard())
            .map(|c| self.evaluate_one(key, c, problem, solution))
            .collect();
        let mut conflicts: Vec<_> = hard.iter().flat_map(|e| e.conflicts.clone()).collect();

        if hard.iter().any(|e| e.score < 1.0) {
            trace!(solution = %solution.id, conflicts = conflicts.len(), "infeasible");
            return SchedulingEvaluation {
                solution_id: solution.id,
                score: Score::Infeasible,
                physical_score: 0.0,
                quality_score: 0.0,
                hard_evaluations: hard,
                soft_evaluations: Vec::new(),
                conflicts,
            };
        }

        let soft: Vec<ConstraintEvaluation> = manager
            .active()
            .filter(|c| !c.is_hard())
            .map(|c| self.evaluate_one(key, c, problem, solution))
            .collect();
        conflicts.extend(soft.iter().flat_map(|e| e.conflicts.clone()));

        let bucket = |tier: ConstraintHierarchy| -> Vec<ConstraintEvaluation> {
            soft.iter().filter(|e| e.hierarchy == tier).cloned().collect()
        };
        let physical = weighted_average(&bucket(ConstraintHierarchy::Level3PhysicalSoft));
        let quality = weighted_average(&bucket(ConstraintHierarchy::Level4QualitySoft));
        let value = self.physical_weight * physical + self.quality_weight * quality;
        trace!(solution = %solution.id, value, "feasible");

        SchedulingEvaluation {
            solution_id: solution.id,
            score: Score::feasible(value),
            physical_score: physical,
            quality_score: quality,
            hard_evaluations: hard,
            soft_evaluations: soft,
            conflicts,
        }
    }

    pub fn score(
        &self,
        manager: &ConstraintManager,
        problem: &SchedulingProblem,
        solution: &SchedulingSolution,
    ) -> Score {
        self.evaluate(manager, problem, solution).score
    }

    /// Feasibility dominates, then the score.
    pub fn is_better_solution(
        &self,
        manager: &ConstraintManager,
        problem: &SchedulingProblem,
        candidate: &SchedulingSolution,
        incumbent: &SchedulingSolution,
    ) -> bool {
        self.score(manager, problem, candidate)
            .is_better_than(&self.score(manager, problem, incumbent))
    }
}

impl Default for SolutionEvaluator {
    fn default() -> Self {
        Self::new(0.6, 0.4)
    }
}
