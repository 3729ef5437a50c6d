//! Conflict repair: per-type handlers propose moves, the resolver picks and
//! applies the best one under a chosen strategy.

mod handlers;

pub use handlers::{ClassroomConflictHandler, TeacherConflictHandler};

use std::cmp::Reverse;
use thiserror::Error;
use tracing::{debug, info, warn};
use types::{
    ConflictResolutionStrategy, ConflictSeverity, ConflictType, SchedulingConflict,
    SchedulingProblem, SchedulingSolution, SolutionError,
};

use crate::context::SchedulingContext;
use crate::moves::Move;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("conflict resolution strategy {0:?} is not supported")]
    UnsupportedStrategy(ConflictResolutionStrategy),
    #[error(transparent)]
    Apply(#[from] SolutionError),
}

/// One way to fix a conflict. `compatibility` (0..=100) is higher the less
/// the option disturbs the rest of the timetable.
#[derive(Clone, Debug, PartialEq)]
pub struct ConflictResolutionOption {
    pub description: String,
    pub compatibility: u8,
    pub impacts: Vec<String>,
    pub actions: Vec<Move>,
}

impl ConflictResolutionOption {
    pub fn new(description: impl Into<String>, compatibility: u8, actions: Vec<Move>) -> Self {
        let impacts = actions.iter().map(ToString::to_string).collect();
        Self {
            description: description.into(),
            compatibility: compatibility.min(100),
            impacts,
            actions,
        }
    }

    /// Applies every action or none of them.
    pub fn apply(
        &self,
        problem: &SchedulingProblem,
        solution: &mut SchedulingSolution,
    ) -> Result<(), SolutionError> {
        let mut next = solution.clone();
        for action in &self.actions {
            action.apply(problem, &mut next)?;
        }
        *solution = next;
        Ok(())
    }
}

/// Trial-applies `option` and blends the resulting score with its compatibility.
/// `None` when the option no longer applies.
pub fn score_option(
    ctx: &SchedulingContext<'_>,
    solution: &SchedulingSolution,
    option: &ConflictResolutionOption,
) -> Option<f64> {
    let mut trial = solution.clone();
    option.apply(ctx.problem, &mut trial).ok()?;
    let score = ctx.score(&trial).value_or(0.0);
    Some(score * 0.8 + f64::from(option.compatibility) / 100.0 * 0.2)
}

pub fn select_best_option<'o>(
    ctx: &SchedulingContext<'_>,
    solution: &SchedulingSolution,
    options: &'o [ConflictResolutionOption],
) -> Option<&'o ConflictResolutionOption> {
    options
        .iter()
        .filter_map(|o| score_option(ctx, solution, o).map(|s| (s, o)))
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, o)| o)
}

/// Highest severity first, then the conflicts touching the most entities.
pub fn prioritize(conflicts: &mut [SchedulingConflict]) {
    conflicts.sort_by_key(|c| (Reverse(c.severity), Reverse(c.involved_count())));
}

pub trait ConflictHandler: Send + Sync {
    fn conflict_type(&self) -> ConflictType;

    /// Options for `conflict` as it stands in `solution`. Empty once the
    /// conflict no longer holds.
    fn resolution_options(
        &self,
        ctx: &SchedulingContext<'_>,
        conflict: &SchedulingConflict,
        solution: &SchedulingSolution,
    ) -> Vec<ConflictResolutionOption>;

    fn apply_resolution(
        &self,
        ctx: &SchedulingContext<'_>,
        option: &ConflictResolutionOption,
        solution: &mut SchedulingSolution,
    ) -> Result<(), SolutionError> {
        option.apply(ctx.problem, solution)
    }

    /// Resolves one conflict in place. Returns whether anything changed.
    fn resolve_one(
        &self,
        ctx: &SchedulingContext<'_>,
        conflict: &SchedulingConflict,
        solution: &mut SchedulingSolution,
    ) -> Result<bool, SolutionError> {
        let options = self.resolution_options(ctx, conflict, solution);
        let Some(best) = select_best_option(ctx, solution, &options) else {
            debug!(conflict = %conflict.description, "no applicable resolution");
            return Ok(false);
        };
        debug!(option = %best.description, compatibility = best.compatibility, "applying resolution");
        self.apply_resolution(ctx, best, solution)?;
        Ok(true)
    }

    /// Resolves `conflicts` one at a time against a running copy of `solution`.
    fn resolve_batch(
        &self,
        ctx: &SchedulingContext<'_>,
        conflicts: &[SchedulingConflict],
        solution: &SchedulingSolution,
    ) -> Result<SchedulingSolution, SolutionError> {
        let mut ordered = conflicts.to_vec();
        prioritize(&mut ordered);
        let mut working = solution.clone();
        for conflict in &ordered {
            if ctx.is_cancelled() {
                break;
            }
            self.resolve_one(ctx, conflict, &mut working)?;
        }
        Ok(working)
    }
}

pub struct ConflictResolver {
    handlers: Vec<Box<dyn ConflictHandler>>,
}

impl ConflictResolver {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Replaces any handler registered for the same conflict type.
    pub fn register(&mut self, handler: Box<dyn ConflictHandler>) {
        self.handlers
            .retain(|h| h.conflict_type() != handler.conflict_type());
        self.handlers.push(handler);
    }

    pub fn handler(&self, conflict_type: ConflictType) -> Option<&dyn ConflictHandler> {
        self.handlers
            .iter()
            .find(|h| h.conflict_type() == conflict_type)
            .map(|h| h.as_ref())
    }

    fn handled_conflicts(
        &self,
        ctx: &SchedulingContext<'_>,
        solution: &SchedulingSolution,
    ) -> Vec<SchedulingConflict> {
        ctx.evaluate(solution)
            .conflicts
            .into_iter()
            .filter(|c| self.handler(c.conflict_type).is_some())
            .collect()
    }

    /// Returns a repaired copy of `solution`; the input is never touched.
    pub fn resolve(
        &self,
        ctx: &SchedulingContext<'_>,
        solution: &SchedulingSolution,
        strategy: ConflictResolutionStrategy,
    ) -> Result<SchedulingSolution, ResolveError> {
        use ConflictResolutionStrategy::*;
        if !matches!(strategy, Sequential | Holistic | Hybrid | Auto) {
            warn!(?strategy, "unsupported conflict resolution strategy");
            return Err(ResolveError::UnsupportedStrategy(strategy));
        }
        let conflicts = self.handled_conflicts(ctx, solution);
        if conflicts.is_empty() {
            return Ok(solution.clone());
        }
        info!(?strategy, conflicts = conflicts.len(), "resolving conflicts");
        let resolved = match strategy {
            Sequential => self.sequential(ctx, conflicts, solution)?,
            Holistic => self.holistic(ctx, &conflicts, solution)?,
            _ => {
                let (critical, _): (Vec<_>, Vec<_>) = conflicts
                    .into_iter()
                    .partition(|c| c.severity == ConflictSeverity::Critical);
                let working = self.sequential(ctx, critical, solution)?;
                let rest: Vec<_> = self
                    .handled_conflicts(ctx, &working)
                    .into_iter()
                    .filter(|c| c.severity != ConflictSeverity::Critical)
                    .collect();
                self.holistic(ctx, &rest, &working)?
            }
        };
        let remaining = self.handled_conflicts(ctx, &resolved).len();
        debug!(remaining, "conflict resolution finished");
        Ok(resolved)
    }

    fn sequential(
        &self,
        ctx: &SchedulingContext<'_>,
        mut conflicts: Vec<SchedulingConflict>,
        solution: &SchedulingSolution,
    ) -> Result<SchedulingSolution, SolutionError> {
        prioritize(&mut conflicts);
        let mut working = solution.clone();
        for conflict in &conflicts {
            if ctx.is_cancelled() {
                break;
            }
            if let Some(handler) = self.handler(conflict.conflict_type) {
                handler.resolve_one(ctx, conflict, &mut working)?;
            }
        }
        Ok(working)
    }

    fn holistic(
        &self,
        ctx: &SchedulingContext<'_>,
        conflicts: &[SchedulingConflict],
        solution: &SchedulingSolution,
    ) -> Result<SchedulingSolution, SolutionError> {
        let mut working = solution.clone();
        for handler in &self.handlers {
            let group: Vec<_> = conflicts
                .iter()
                .filter(|c| c.conflict_type == handler.conflict_type())
                .cloned()
                .collect();
            if group.is_empty() || ctx.is_cancelled() {
                continue;
            }
            working = handler.resolve_batch(ctx, &group, &working)?;
        }
        Ok(working)
    }
}

impl Default for ConflictResolver {
    /// Teacher and classroom double-booking handlers.
    fn default() -> Self {
        let mut resolver = Self::new();
        resolver.register(Box::new(TeacherConflictHandler));
        resolver.register(Box::new(ClassroomConflictHandler));
        resolver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CancellationToken;
    use crate::testing::{raw, Fixture};
    use types::{AssignmentId, SchedulingParameters, SectionId, TeacherId, TimeSlotId};

    fn ctx(problem: &SchedulingProblem) -> SchedulingContext<'_> {
        SchedulingContext::new(problem, &SchedulingParameters::default(), CancellationToken::new())
    }

    #[test]
    fn every_working_strategy_clears_a_teacher_clash() {
        let p = Fixture::new().sections(2).teachers(1).classrooms(2).timeslots(3).build();
        let clash = raw(&p, &[(1, 1, 1, 1), (2, 1, 2, 1)]);
        let ctx = ctx(&p);
        let resolver = ConflictResolver::default();
        for strategy in [
            ConflictResolutionStrategy::Sequential,
            ConflictResolutionStrategy::Holistic,
            ConflictResolutionStrategy::Hybrid,
            ConflictResolutionStrategy::Auto,
        ] {
            let fixed = resolver.resolve(&ctx, &clash, strategy).unwrap();
            assert!(fixed.is_conflict_free(), "{strategy:?}");
            assert!(ctx.score(&fixed).is_feasible());
            assert_eq!(fixed.len(), 2);
        }
        assert!(!clash.is_conflict_free());
    }

    #[test]
    fn placeholder_strategies_are_rejected() {
        let p = Fixture::new().sections(2).teachers(1).classrooms(2).timeslots(3).build();
        let clash = raw(&p, &[(1, 1, 1, 1), (2, 1, 2, 1)]);
        let err = ConflictResolver::default()
            .resolve(&ctx(&p), &clash, ConflictResolutionStrategy::IgnoreConflict)
            .unwrap_err();
        assert!(matches!(err, ResolveError::UnsupportedStrategy(_)));
    }

    #[test]
    fn option_application_is_atomic() {
        let p = Fixture::new().sections(2).teachers(2).classrooms(2).timeslots(2).build();
        let mut s = raw(&p, &[(1, 1, 1, 1), (2, 2, 2, 2)]);
        let before = s.clone();
        // the first move is fine on its own; the second then double books teacher 1
        let option = ConflictResolutionOption::new(
            "move then reassign",
            50,
            vec![
                Move::ReassignTimeSlot {
                    assignment: AssignmentId(1),
                    timeslot: TimeSlotId(2),
                },
                Move::ReassignTeacher {
                    assignment: AssignmentId(2),
                    teacher: TeacherId(1),
                },
            ],
        );
        assert_eq!(option.impacts.len(), 2);
        assert!(option.apply(&p, &mut s).is_err());
        assert_eq!(s, before);
    }

    #[test]
    fn prioritize_orders_by_severity_then_size() {
        let mk = |sev, n: u32| {
            SchedulingConflict::new(1, ConflictType::Other, sev, "x")
                .with_sections((1..=n).map(SectionId))
        };
        let mut list = vec![
            mk(ConflictSeverity::Minor, 5),
            mk(ConflictSeverity::Critical, 1),
            mk(ConflictSeverity::Critical, 3),
        ];
        prioritize(&mut list);
        assert_eq!(list[0].severity, ConflictSeverity::Critical);
        assert_eq!(list[0].sections.len(), 3);
        assert_eq!(list[2].severity, ConflictSeverity::Minor);
    }
}
