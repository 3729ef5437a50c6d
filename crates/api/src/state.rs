use jobs::InMemJobs;
use solver_heur::SchedulingEngine;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<InMemJobs<SchedulingEngine>>,
}

impl AppState {
    pub fn new_default() -> Self {
        Self {
            jobs: Arc::new(InMemJobs::new(SchedulingEngine::new())),
        }
    }
}
