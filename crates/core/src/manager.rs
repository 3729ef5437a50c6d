use tracing::{debug, error, info};
use types::{
    Assignment, ConflictSeverity, ConflictType, ConstraintEvaluation, ConstraintHierarchy,
    ConstraintLevel, SchedulingConflict, SchedulingProblem, SchedulingSolution,
};

use crate::constraints::{default_constraints, Constraint};
use crate::rules;

/// Score at or above which a constraint counts as satisfied.
pub const SATISFIED_THRESHOLD: f64 = 0.99;

/// Hard/soft breakdown of one full pass over the active constraints.
#[derive(Clone, Debug)]
pub struct ManagerEvaluation {
    pub hard: Vec<ConstraintEvaluation>,
    pub soft: Vec<ConstraintEvaluation>,
    pub feasible: bool,
    /// `feasible ? hard * 0.7 + soft * 0.3 : 0`
    pub score: f64,
}

pub struct ConstraintManager {
    constraints: Vec<Box<dyn Constraint>>,
    level: ConstraintLevel,
}

impl ConstraintManager {
    pub fn new() -> Self {
        Self {
            constraints: Vec::new(),
            level: ConstraintLevel::Complete,
        }
    }

    /// Full catalogue for `problem`, everything active.
    pub fn with_defaults(problem: &SchedulingProblem) -> Self {
        Self {
            constraints: default_constraints(problem),
            level: ConstraintLevel::Complete,
        }
    }

    pub fn level(&self) -> ConstraintLevel {
        self.level
    }

    /// Adds `constraint`, replacing any constraint with the same id.
    pub fn register(&mut self, constraint: Box<dyn Constraint>) {
        match self.constraints.iter().position(|c| c.id() == constraint.id()) {
            Some(i) => self.constraints[i] = constraint,
            None => self.constraints.push(constraint),
        }
    }

    pub fn remove(&mut self, definition_id: &str) -> Option<Box<dyn Constraint>> {
        let i = self
            .constraints
            .iter()
            .position(|c| c.definition_id() == definition_id)?;
        Some(self.constraints.remove(i))
    }

    pub fn all(&self) -> impl Iterator<Item = &dyn Constraint> {
        self.constraints.iter().map(|c| c.as_ref())
    }

    pub fn find(&self, id: u32) -> Option<&dyn Constraint> {
        self.all().find(|c| c.id() == id)
    }

    pub fn find_by_definition(&self, definition_id: &str) -> Option<&dyn Constraint> {
        self.all().find(|c| c.definition_id() == definition_id)
    }

    pub fn by_hierarchy(&self, hierarchy: ConstraintHierarchy) -> Vec<&dyn Constraint> {
        self.all().filter(|c| c.hierarchy() == hierarchy).collect()
    }

    /// Case-insensitive substring match on the basic rule tag.
    pub fn by_basic_rule(&self, rule: &str) -> Vec<&dyn Constraint> {
        let rule = rule.to_ascii_lowercase();
        self.all()
            .filter(|c| c.basic_rule().to_ascii_lowercase().contains(&rule))
            .collect()
    }

    pub fn active(&self) -> impl Iterator<Item = &dyn Constraint> {
        self.all().filter(|c| c.is_active())
    }

    pub fn is_active(&self, id: u32) -> bool {
        self.find(id).map_or(false, |c| c.is_active())
    }

    fn find_mut(&mut self, id: u32) -> Option<&mut Box<dyn Constraint>> {
        self.constraints.iter_mut().find(|c| c.id() == id)
    }

    /// Returns false when no constraint has `id`.
    pub fn activate(&mut self, id: u32) -> bool {
        self.find_mut(id).map(|c| c.set_active(true)).is_some()
    }

    pub fn deactivate(&mut self, id: u32) -> bool {
        self.find_mut(id).map(|c| c.set_active(false)).is_some()
    }

    pub fn update_weight(&mut self, id: u32, weight: f64) -> bool {
        self.find_mut(id).map(|c| c.set_weight(weight)).is_some()
    }

    /// Deactivates everything, then activates exactly the tiers `level` covers.
    pub fn set_application_level(&mut self, level: ConstraintLevel) {
        for c in &mut self.constraints {
            c.set_active(level.includes(c.hierarchy()));
        }
        self.level = level;
        info!(
            ?level,
            active = self.active().count(),
            total = self.constraints.len(),
            "constraint level applied"
        );
    }

    pub fn evaluate_constraints(
        &self,
        problem: &SchedulingProblem,
        solution: &SchedulingSolution,
    ) -> ManagerEvaluation {
        let mut hard = Vec::new();
        let mut soft = Vec::new();
        for c in self.active() {
            let eval = evaluate_constraint(c, problem, solution);
            if eval.is_hard {
                hard.push(eval);
            } else {
                soft.push(eval);
            }
        }
        let feasible = hard.iter().all(|e| e.score >= 1.0);
        let hard_avg = if hard.is_empty() {
            1.0
        } else {
            hard.iter().map(|e| e.score).sum::<f64>() / hard.len() as f64
        };
        let soft_avg = weighted_average(&soft);
        let score = if feasible {
            hard_avg * 0.7 + soft_avg * 0.3
        } else {
            0.0
        };
        debug!(solution = %solution.id, feasible, score, "constraints evaluated");
        ManagerEvaluation {
            hard,
            soft,
            feasible,
            score,
        }
    }

    /// Every conflict reported by the active constraints.
    pub fn calculate_conflicts(
        &self,
        problem: &SchedulingProblem,
        solution: &SchedulingSolution,
    ) -> Vec<SchedulingConflict> {
        self.active()
            .flat_map(|c| evaluate_constraint(c, problem, solution).conflicts)
            .collect()
    }

    /// Whether `candidate` could take the place of `original` without breaking
    /// any rule the greedy builder enforces.
    pub fn is_valid_replacement(
        &self,
        problem: &SchedulingProblem,
        solution: &SchedulingSolution,
        original: &Assignment,
        candidate: &Assignment,
    ) -> bool {
        let ignore = Some(original.id);
        let (Some(section), Some(teacher), Some(room), Some(_)) = (
            problem.section(candidate.section_id),
            problem.teacher(candidate.teacher_id),
            problem.classroom(candidate.classroom_id),
            problem.timeslot(candidate.timeslot_id),
        ) else {
            return false;
        };

        if solution.has_teacher_conflict(candidate.teacher_id, candidate.timeslot_id, ignore) {
            return false;
        }
        let mut enrollment = section.enrollment;
        for a in solution.for_classroom(candidate.classroom_id) {
            if a.id == original.id || a.timeslot_id != candidate.timeslot_id {
                continue;
            }
            if !a.shares_room_with(candidate) {
                return false;
            }
            enrollment += problem.section(a.section_id).map_or(0, |s| s.enrollment);
        }
        if !rules::teacher_qualified(problem, teacher, section) {
            return false;
        }
        if !rules::room_fits(room, section, enrollment) {
            return false;
        }
        if self.is_active(201) && problem.classroom_unavailable(room.id, candidate.timeslot_id) {
            return false;
        }
        if self.is_active(202) && problem.teacher_unavailable(teacher.id, candidate.timeslot_id) {
            return false;
        }
        if self.is_active(203) && rules::gender_clash(problem, solution, candidate, ignore) {
            return false;
        }
        if rules::splits_cross_listed_group(solution, candidate, ignore) {
            return false;
        }
        !rules::workload_exceeded(teacher, solution, candidate, ignore)
    }
}

impl Default for ConstraintManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs one constraint, turning a failure into a zero score and a synthetic
/// conflict instead of aborting the whole pass.
pub fn evaluate_constraint(
    constraint: &dyn Constraint,
    problem: &SchedulingProblem,
    solution: &SchedulingSolution,
) -> ConstraintEvaluation {
    let (score, conflicts) = match constraint.evaluate(problem, solution) {
        Ok((score, conflicts)) => (score.clamp(0.0, 1.0), conflicts),
        Err(e) => {
            error!(constraint = constraint.definition_id(), error = %e, "constraint evaluation failed");
            let severity = if constraint.is_hard() {
                ConflictSeverity::Critical
            } else {
                ConflictSeverity::Moderate
            };
            let conflict = SchedulingConflict::new(
                constraint.id(),
                ConflictType::ConstraintEvaluationError,
                severity,
                format!("{} could not be evaluated: {e}", constraint.name()),
            );
            (0.0, vec![conflict])
        }
    };
    ConstraintEvaluation {
        constraint_id: constraint.id(),
        definition_id: constraint.definition_id().to_string(),
        name: constraint.name().to_string(),
        hierarchy: constraint.hierarchy(),
        is_hard: constraint.is_hard(),
        weight: constraint.weight(),
        score,
        satisfied: score >= SATISFIED_THRESHOLD,
        conflicts,
    }
}

/// Weighted mean score; 1.0 for an empty bucket or zero total weight.
pub fn weighted_average(evals: &[ConstraintEvaluation]) -> f64 {
    let total: f64 = evals.iter().map(|e| e.weight).sum();
    if total <= 0.0 {
        return 1.0;
    }
    evals.iter().map(|e| e.score * e.weight).sum::<f64>() / total
}
