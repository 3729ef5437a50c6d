use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::ConstraintHierarchy;

/// Institution-level switches that shape which rules apply to a run.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ConstraintSettings {
    pub enable_gender_segregation: bool,
    /// Minutes a teacher needs to change campus between back-to-back classes.
    pub minimum_travel_time: u32,
    pub maximum_consecutive_classes: u32,
    pub enable_ramadan_schedule: bool,
    pub allow_cross_listed_courses: bool,
    pub enable_multi_campus_constraints: bool,
    pub holiday_exclusions: bool,
    pub allow_cross_department_teaching: bool,
    pub prioritize_home_buildings: bool,
}

impl Default for ConstraintSettings {
    fn default() -> Self {
        Self {
            enable_gender_segregation: true,
            minimum_travel_time: 30,
            maximum_consecutive_classes: 3,
            enable_ramadan_schedule: false,
            allow_cross_listed_courses: true,
            enable_multi_campus_constraints: true,
            holiday_exclusions: true,
            allow_cross_department_teaching: true,
            prioritize_home_buildings: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AlgorithmSettings {
    pub initial_temperature: f64,
    pub cooling_rate: f64,
    pub iterations_per_temperature: u32,
    pub min_temperature: f64,
    pub population_size: usize,
    pub crossover_rate: f64,
    pub mutation_rate: f64,
    pub max_generations: u32,
    pub elitism_count: usize,
}

impl Default for AlgorithmSettings {
    fn default() -> Self {
        Self {
            initial_temperature: 100.0,
            cooling_rate: 0.97,
            iterations_per_temperature: 100,
            min_temperature: 0.01,
            population_size: 50,
            crossover_rate: 0.8,
            mutation_rate: 0.2,
            max_generations: 100,
            elitism_count: 5,
        }
    }
}

/// Progressive activation tiers. Each level includes every tier below it.
#[derive(
    Clone, Copy, Debug, Default, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq, Eq,
    PartialOrd, Ord, Hash,
)]
pub enum ConstraintLevel {
    Basic,
    #[default]
    Standard,
    Enhanced,
    Complete,
}

impl ConstraintLevel {
    pub fn includes(self, hierarchy: ConstraintHierarchy) -> bool {
        let top = match self {
            ConstraintLevel::Basic => ConstraintHierarchy::Level1CoreHard,
            ConstraintLevel::Standard => ConstraintHierarchy::Level2ConfigurableHard,
            ConstraintLevel::Enhanced => ConstraintHierarchy::Level3PhysicalSoft,
            ConstraintLevel::Complete => ConstraintHierarchy::Level4QualitySoft,
        };
        hierarchy <= top
    }
}

#[derive(
    Clone, Copy, Debug, Default, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq, Eq,
)]
pub enum ConflictResolutionStrategy {
    Sequential,
    Holistic,
    #[default]
    Hybrid,
    Auto,
    ReassignTeacher,
    ReassignClassroom,
    ReassignTime,
    IgnoreConflict,
}

/// Refinement applied to each generated solution when local search is on.
#[derive(
    Clone, Copy, Debug, Default, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq, Eq,
)]
pub enum LocalSearch {
    #[default]
    Annealing,
    Hybrid,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulingParameters {
    pub use_basic_constraints: bool,
    pub use_standard_constraints: bool,
    pub use_enhanced_constraints: bool,
    pub enable_local_search: bool,
    pub local_search: LocalSearch,
    pub max_ls_iterations: u32,
    pub initial_temperature: f64,
    pub cooling_rate: f64,
    pub final_temperature: f64,
    pub physical_soft_weight: f64,
    pub quality_soft_weight: f64,
    pub initial_solution_count: usize,
    pub generate_multiple_solutions: bool,
    pub solution_count: usize,
    pub min_solution_difference: f64,
    pub conflict_resolution_strategy: ConflictResolutionStrategy,
    pub algorithm: AlgorithmSettings,
    pub seed: u64,
}

impl Default for SchedulingParameters {
    fn default() -> Self {
        Self {
            use_basic_constraints: false,
            use_standard_constraints: true,
            use_enhanced_constraints: false,
            enable_local_search: true,
            local_search: LocalSearch::Annealing,
            max_ls_iterations: 1000,
            initial_temperature: 1.0,
            cooling_rate: 0.995,
            final_temperature: 0.01,
            physical_soft_weight: 0.6,
            quality_soft_weight: 0.4,
            initial_solution_count: 3,
            generate_multiple_solutions: false,
            solution_count: 1,
            min_solution_difference: 0.1,
            conflict_resolution_strategy: ConflictResolutionStrategy::Hybrid,
            algorithm: AlgorithmSettings::default(),
            seed: 0,
        }
    }
}

impl SchedulingParameters {
    /// Basic wins over Enhanced; anything else runs at Standard.
    pub fn constraint_level(&self) -> ConstraintLevel {
        if self.use_basic_constraints {
            ConstraintLevel::Basic
        } else if self.use_enhanced_constraints {
            ConstraintLevel::Enhanced
        } else {
            ConstraintLevel::Standard
        }
    }

    pub fn target_solution_count(&self) -> usize {
        if self.generate_multiple_solutions {
            self.solution_count.max(3)
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_nested() {
        let tiers = [
            ConstraintHierarchy::Level1CoreHard,
            ConstraintHierarchy::Level2ConfigurableHard,
            ConstraintHierarchy::Level3PhysicalSoft,
            ConstraintHierarchy::Level4QualitySoft,
        ];
        let levels = [
            ConstraintLevel::Basic,
            ConstraintLevel::Standard,
            ConstraintLevel::Enhanced,
            ConstraintLevel::Complete,
        ];
        for pair in levels.windows(2) {
            for t in tiers {
                if pair[0].includes(t) {
                    assert!(pair[1].includes(t), "{:?} lost {:?}", pair[1], t);
                }
            }
        }
        assert_eq!(tiers.iter().filter(|t| ConstraintLevel::Basic.includes(**t)).count(), 1);
        assert_eq!(tiers.iter().filter(|t| ConstraintLevel::Complete.includes(**t)).count(), 4);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let p: SchedulingParameters =
            serde_json::from_str(r#"{"useBasicConstraints": true, "algorithm": {"crossoverRate": 0.5}}"#)
                .unwrap();
        assert_eq!(p.constraint_level(), ConstraintLevel::Basic);
        assert_eq!(p.algorithm.crossover_rate, 0.5);
        assert_eq!(p.algorithm.population_size, 50);
        assert_eq!(p.max_ls_iterations, 1000);
        assert_eq!(p.physical_soft_weight, 0.6);
    }

    #[test]
    fn target_count_has_floor_of_three_when_multiple() {
        let mut p = SchedulingParameters::default();
        assert_eq!(p.target_solution_count(), 1);
        p.generate_multiple_solutions = true;
        p.solution_count = 2;
        assert_eq!(p.target_solution_count(), 3);
        p.solution_count = 7;
        assert_eq!(p.target_solution_count(), 7);
    }
}
