use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use types::{SchedulingEvaluation, SchedulingParameters, SchedulingProblem, SchedulingSolution, Score};

use crate::evaluator::SolutionEvaluator;
use crate::manager::ConstraintManager;

/// Cooperative stop flag. Clones share the flag.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Everything one scheduling run needs, passed explicitly down the pipeline.
pub struct SchedulingContext<'p> {
    pub problem: &'p SchedulingProblem,
    pub manager: ConstraintManager,
    pub evaluator: SolutionEvaluator,
    pub cancel: CancellationToken,
}

impl<'p> SchedulingContext<'p> {
    /// Default catalogue at the level the parameters ask for.
    pub fn new(
        problem: &'p SchedulingProblem,
        params: &SchedulingParameters,
        cancel: CancellationToken,
    ) -> Self {
        let mut manager = ConstraintManager::with_defaults(problem);
        manager.set_application_level(params.constraint_level());
        Self {
            problem,
            manager,
            evaluator: SolutionEvaluator::new(params.physical_soft_weight, params.quality_soft_weight),
            cancel,
        }
    }

    pub fn evaluate(&self, solution: &SchedulingSolution) -> SchedulingEvaluation {
        self.evaluator.evaluate(&self.manager, self.problem, solution)
    }

    pub fn score(&self, solution: &SchedulingSolution) -> Score {
        self.evaluator.score(&self.manager, self.problem, solution)
    }

    pub fn is_better(&self, candidate: &SchedulingSolution, incumbent: &SchedulingSolution) -> bool {
        self.evaluator
            .is_better_solution(&self.manager, self.problem, candidate, incumbent)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
