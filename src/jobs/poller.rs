//! Job poller: single non-blocking status checks for submitted jobs

use std::sync::Arc;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::jobs::executor::{JobExecutor, JobState};
use crate::jobs::types::{GenerationResult, JobHandle};

/// Outcome of one poll
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Ready(GenerationResult),
    Pending,
}

pub struct JobPoller {
    executor: Arc<JobExecutor>,
}

impl JobPoller {
    pub fn new(executor: Arc<JobExecutor>) -> Self {
        Self { executor }
    }

    /// Check a job once. Never waits for completion.
    ///
    /// A failed job reports its stored error on every poll; unknown or
    /// expired handles report `JobNotFound`.
    pub fn poll(&self, handle: &JobHandle) -> Result<PollOutcome> {
        match self.executor.try_get(handle) {
            Some(JobState::Pending) => {
                debug!(job_id = %handle, "Job still pending");
                Ok(PollOutcome::Pending)
            }
            Some(JobState::Ready(result)) => Ok(PollOutcome::Ready(result)),
            Some(JobState::Failed(failure)) => Err(failure.to_error()),
            None => Err(AppError::JobNotFound(handle.to_string())),
        }
    }
}
