//! Heuristic search for timetables: greedy construction, simulated annealing,
//! a genetic/annealing hybrid and the engine that strings them together.

pub mod analyzer;
pub mod annealing;
pub mod diversity;
pub mod engine;
pub mod greedy;
pub mod hybrid;

use thiserror::Error;

pub use analyzer::{ProblemAnalyzer, ProblemFeatures};
pub use annealing::{should_accept, SimulatedAnnealing};
pub use diversity::{average_difference, diversify, solution_difference};
pub use engine::SchedulingEngine;
pub use greedy::{GreedyGenerator, GreedyOutcome};
pub use hybrid::HybridOptimizer;

#[derive(Debug, Error)]
pub enum HeurError {
    #[error("scheduling was cancelled")]
    Cancelled,
    #[error(transparent)]
    Resolve(#[from] sched_core::ResolveError),
    #[error("scheduling aborted: {0}")]
    Panicked(String),
}
