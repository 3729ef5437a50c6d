use serde::Serialize;
use types::{SchedulingParameters, SchedulingProblem};

use sched_core::default_constraints;

const SMALL_PROBLEM: usize = 20;
const MEDIUM_PROBLEM: usize = 100;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemFeatures {
    pub section_count: usize,
    pub teacher_count: usize,
    pub classroom_count: usize,
    pub timeslot_count: usize,
    pub constraint_count: usize,
    pub hard_constraint_count: usize,
    pub soft_constraint_count: usize,
    pub cross_listed_count: usize,
    pub average_enrollment: f64,
    /// 0 for trivial problems, 1 for large heavily constrained ones.
    pub complexity: f64,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ProblemAnalyzer;

impl ProblemAnalyzer {
    pub fn analyze(&self, problem: &SchedulingProblem) -> ProblemFeatures {
        let catalogue = default_constraints(problem);
        let hard = catalogue.iter().filter(|c| c.is_hard()).count();
        let sections = problem.sections.len();
        let enrollment: u64 = problem.sections.iter().map(|s| u64::from(s.enrollment)).sum();

        let mut features = ProblemFeatures {
            section_count: sections,
            teacher_count: problem.teachers.len(),
            classroom_count: problem.classrooms.len(),
            timeslot_count: problem.timeslots.len(),
            constraint_count: catalogue.len(),
            hard_constraint_count: hard,
            soft_constraint_count: catalogue.len() - hard,
            cross_listed_count: problem
                .sections
                .iter()
                .filter(|s| s.cross_listed_group.is_some())
                .count(),
            average_enrollment: if sections == 0 {
                0.0
            } else {
                enrollment as f64 / sections as f64
            },
            complexity: 0.0,
        };
        features.complexity = complexity(&features);
        features
    }

    /// Defaults tuned to the problem size, used when a request carries no
    /// parameters of its own.
    pub fn recommend_parameters(&self, features: &ProblemFeatures) -> SchedulingParameters {
        SchedulingParameters {
            initial_solution_count: if features.section_count < 50 { 5 } else { 3 },
            max_ls_iterations: 1000,
            initial_temperature: 1.0,
            cooling_rate: 0.995,
            ..Default::default()
        }
    }
}

fn complexity(f: &ProblemFeatures) -> f64 {
    let n = f.section_count;
    let size = if n <= SMALL_PROBLEM {
        n as f64 / SMALL_PROBLEM as f64 * 0.5
    } else if n <= MEDIUM_PROBLEM {
        0.5 + (n - SMALL_PROBLEM) as f64 / (MEDIUM_PROBLEM - SMALL_PROBLEM) as f64 * 0.5
    } else {
        1.0
    };
    let constraints = (f.constraint_count as f64 / 20.0).min(1.0);
    size * 0.7 + constraints * 0.3
}

#[cfg(test)]
mod tests {
    use super::*;
    use sched_core::testing::Fixture;

    #[test]
    fn features_of_fixture() {
        let p = Fixture::new().sections(10).teachers(3).classrooms(2).timeslots(8).build();
        let f = ProblemAnalyzer.analyze(&p);
        assert_eq!(f.section_count, 10);
        assert_eq!(f.constraint_count, 13);
        assert_eq!(f.hard_constraint_count, 6);
        assert_eq!(f.average_enrollment, 20.0);
        // size 0.25 * 0.7 + constraints 0.65 * 0.3
        assert!((f.complexity - 0.37).abs() < 1e-9, "{}", f.complexity);
    }

    #[test]
    fn complexity_saturates() {
        let big = ProblemFeatures {
            section_count: 500,
            constraint_count: 40,
            ..Default::default()
        };
        assert_eq!(complexity(&big), 1.0);
        let mid = ProblemFeatures {
            section_count: 60,
            ..Default::default()
        };
        assert!((complexity(&mid) - 0.525).abs() < 1e-9);
    }

    #[test]
    fn small_problems_get_more_starts() {
        let a = ProblemAnalyzer;
        let small = a.recommend_parameters(&ProblemFeatures { section_count: 10, ..Default::default() });
        let large = a.recommend_parameters(&ProblemFeatures { section_count: 80, ..Default::default() });
        assert_eq!(small.initial_solution_count, 5);
        assert_eq!(large.initial_solution_count, 3);
        assert_eq!(small.cooling_rate, 0.995);
    }
}
