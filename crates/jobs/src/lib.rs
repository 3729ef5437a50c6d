use parking_lot::RwLock;
use sched_core::{CancellationToken, Solver};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};
use types::{ScheduleRequest, SchedulingResult, SchedulingStatus};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, ToSchema)]
pub struct JobId(pub String);

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize, ToSchema)]
#[serde(tag = "status")]
pub enum JobStatus {
    Queued,
    Running,
    Finished { result: SchedulingResult },
    Failed { message: String },
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Finished { .. } | JobStatus::Failed { .. } | JobStatus::Cancelled
        )
    }
}

struct Job {
    status: JobStatus,
    cancel: CancellationToken,
}

#[derive(Clone)]
pub struct InMemJobs<S: Solver> {
    inner: Arc<RwLock<HashMap<String, Job>>>,
    solver: Arc<S>,
}

impl<S: Solver> InMemJobs<S> {
    pub fn new(solver: S) -> Self {
        Self {
            inner: Default::default(),
            solver: Arc::new(solver),
        }
    }

    /// Starts the run on the tokio runtime and returns immediately.
    pub fn enqueue(&self, request: ScheduleRequest) -> JobId {
        let id = Uuid::new_v4().to_string();
        let cancel = CancellationToken::new();
        self.inner.write().insert(
            id.clone(),
            Job {
                status: JobStatus::Queued,
                cancel: cancel.clone(),
            },
        );

        let map = self.inner.clone();
        let solver = self.solver.clone();
        let job = id.clone();

        tokio::spawn(async move {
            if !set_status(&map, &job, JobStatus::Running) {
                return;
            }
            let status = match solver.solve(request, cancel).await {
                Ok(result) if result.status == SchedulingStatus::Cancelled => JobStatus::Cancelled,
                Ok(result) => {
                    info!(job = %job, status = ?result.status, "job finished");
                    JobStatus::Finished { result }
                }
                Err(e) => {
                    error!(job = %job, ?e, "job failed");
                    JobStatus::Failed {
                        message: e.to_string(),
                    }
                }
            };
            set_status(&map, &job, status);
        });

        JobId(id)
    }

    pub fn get(&self, id: &str) -> Option<JobStatus> {
        self.inner.read().get(id).map(|j| j.status.clone())
    }

    /// Signals a queued or running job to stop. Returns false for unknown or
    /// already finished jobs.
    pub fn cancel(&self, id: &str) -> bool {
        let mut jobs = self.inner.write();
        let Some(job) = jobs.get_mut(id) else {
            return false;
        };
        if job.status.is_terminal() {
            return false;
        }
        job.cancel.cancel();
        job.status = JobStatus::Cancelled;
        info!(job = %id, "job cancelled");
        true
    }
}

/// Updates a job unless it already reached a terminal state.
fn set_status(map: &RwLock<HashMap<String, Job>>, id: &str, status: JobStatus) -> bool {
    let mut jobs = map.write();
    match jobs.get_mut(id) {
        Some(job) if !job.status.is_terminal() => {
            job.status = status;
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Finishes at once, or waits for cancellation when the problem id is 0.
    struct Stub;

    #[async_trait]
    impl Solver for Stub {
        async fn solve(
            &self,
            request: ScheduleRequest,
            cancel: CancellationToken,
        ) -> anyhow::Result<SchedulingResult> {
            if request.problem.id == 0 {
                while !cancel.is_cancelled() {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                return Ok(SchedulingResult {
                    status: SchedulingStatus::Cancelled,
                    ..Default::default()
                });
            }
            if request.problem.id == 13 {
                anyhow::bail!("unlucky problem");
            }
            Ok(SchedulingResult {
                status: SchedulingStatus::Success,
                message: format!("solved {}", request.problem.id),
                ..Default::default()
            })
        }
    }

    fn request(id: u32) -> ScheduleRequest {
        ScheduleRequest {
            problem: types::SchedulingProblem {
                id,
                ..Default::default()
            },
            parameters: None,
        }
    }

    async fn settle(jobs: &InMemJobs<Stub>, id: &JobId) -> JobStatus {
        for _ in 0..200 {
            match jobs.get(&id.0) {
                Some(s) if s.is_terminal() => return s,
                _ => tokio::time::sleep(Duration::from_millis(5)).await,
            }
        }
        panic!("job {} never settled", id.0);
    }

    #[tokio::test]
    async fn finished_job_keeps_result() {
        let jobs = InMemJobs::new(Stub);
        let id = jobs.enqueue(request(4));
        match settle(&jobs, &id).await {
            JobStatus::Finished { result } => assert_eq!(result.message, "solved 4"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!jobs.cancel(&id.0));
    }

    #[tokio::test]
    async fn solver_error_marks_job_failed() {
        let jobs = InMemJobs::new(Stub);
        let id = jobs.enqueue(request(13));
        assert!(matches!(
            settle(&jobs, &id).await,
            JobStatus::Failed { message } if message.contains("unlucky")
        ));
    }

    #[tokio::test]
    async fn cancel_stops_a_running_job() {
        let jobs = InMemJobs::new(Stub);
        let id = jobs.enqueue(request(0));
        assert!(jobs.cancel(&id.0));
        assert!(matches!(settle(&jobs, &id).await, JobStatus::Cancelled));
        assert!(!jobs.cancel("missing"));
        assert!(jobs.get("missing").is_none());
    }
}
