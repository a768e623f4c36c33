//! In-process asynchronous execution of worker invocations
//!
//! Every submitted invocation runs on its own task; its state lives in a
//! concurrent table keyed by the job handle issued at submission.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::JobsConfig;
use crate::error::{AppError, Result};
use crate::jobs::types::{GenerationResult, JobHandle};
use crate::worker::traits::{ImageWorker, WorkerRequest};

/// Why a job ended without a result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    WorkerUnavailable,
    InferenceFailure,
}

/// Stored failure of a finished job, replayed on every poll
#[derive(Debug, Clone, PartialEq)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl JobFailure {
    fn from_error(error: &AppError) -> Self {
        match error {
            AppError::WorkerUnavailable(message) => Self {
                kind: FailureKind::WorkerUnavailable,
                message: message.clone(),
            },
            AppError::InferenceFailure(message) => Self {
                kind: FailureKind::InferenceFailure,
                message: message.clone(),
            },
            other => Self {
                kind: FailureKind::InferenceFailure,
                message: other.to_string(),
            },
        }
    }

    pub fn to_error(&self) -> AppError {
        match self.kind {
            FailureKind::WorkerUnavailable => AppError::WorkerUnavailable(self.message.clone()),
            FailureKind::InferenceFailure => AppError::InferenceFailure(self.message.clone()),
        }
    }
}

/// Lifecycle of a job
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Pending,
    Ready(GenerationResult),
    Failed(JobFailure),
}

#[derive(Debug)]
struct JobRecord {
    model_id: String,
    state: JobState,
    submitted_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

/// Configuration for the executor
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Upper bound for one worker invocation
    pub timeout: Duration,
    /// How long finished jobs remain retrievable
    pub result_ttl: Duration,
    /// Worker invocations allowed to run at once
    pub max_in_flight: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(900),
            result_ttl: Duration::from_secs(3600),
            max_in_flight: 32,
        }
    }
}

impl From<&JobsConfig> for ExecutorConfig {
    fn from(config: &JobsConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            result_ttl: Duration::from_secs(config.result_ttl_secs),
            max_in_flight: config.max_in_flight,
        }
    }
}

/// Executes worker invocations and tracks asynchronous jobs
pub struct JobExecutor {
    jobs: Arc<DashMap<JobHandle, JobRecord>>,
    semaphore: Arc<Semaphore>,
    config: ExecutorConfig,
    submitted_count: AtomicU64,
    completed_count: Arc<AtomicU64>,
}

impl JobExecutor {
    pub fn new() -> Self {
        Self::with_config(ExecutorConfig::default())
    }

    pub fn with_config(config: ExecutorConfig) -> Self {
        Self {
            jobs: Arc::new(DashMap::new()),
            semaphore: Arc::new(Semaphore::new(config.max_in_flight.max(1))),
            config,
            submitted_count: AtomicU64::new(0),
            completed_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Invoke a worker and wait for it, bounded by the invocation timeout
    pub async fn run(&self, worker: Arc<dyn ImageWorker>, request: WorkerRequest) -> Result<GenerationResult> {
        invoke(&self.semaphore, self.config.timeout, worker, request).await
    }

    /// Start an invocation in the background and return its handle at once
    pub fn submit(&self, worker: Arc<dyn ImageWorker>, request: WorkerRequest) -> JobHandle {
        let handle = JobHandle::generate();
        let model_id = worker.profile().model_id.clone();

        // Record before spawning so a poll can never miss the job
        self.jobs.insert(
            handle.clone(),
            JobRecord {
                model_id: model_id.clone(),
                state: JobState::Pending,
                submitted_at: Utc::now(),
                finished_at: None,
            },
        );
        self.submitted_count.fetch_add(1, Ordering::Relaxed);

        let jobs = self.jobs.clone();
        let semaphore = self.semaphore.clone();
        let completed = self.completed_count.clone();
        let timeout = self.config.timeout;
        let job_handle = handle.clone();

        tokio::spawn(async move {
            let model = worker.profile().model_id.clone();
            let invocation =
                tokio::spawn(async move { invoke(&semaphore, timeout, worker, request).await });

            let state = match invocation.await {
                Ok(Ok(result)) => JobState::Ready(result),
                Ok(Err(e)) => JobState::Failed(JobFailure::from_error(&e)),
                Err(e) => JobState::Failed(JobFailure::from_error(&AppError::InferenceFailure(
                    format!("Worker for '{}' aborted: {}", model, e),
                ))),
            };

            if let Some(mut record) = jobs.get_mut(&job_handle) {
                let finished_at = Utc::now();
                let elapsed_ms = (finished_at - record.submitted_at).num_milliseconds();

                match &state {
                    JobState::Failed(failure) => warn!(
                        job_id = %job_handle,
                        model = %record.model_id,
                        elapsed_ms,
                        error = %failure.message,
                        "Job failed"
                    ),
                    _ => info!(job_id = %job_handle, model = %record.model_id, elapsed_ms, "Job finished"),
                }

                record.state = state;
                record.finished_at = Some(finished_at);
            }

            completed.fetch_add(1, Ordering::Relaxed);
        });

        debug!(job_id = %handle, model = %model_id, "Job submitted");
        handle
    }

    /// Non-blocking look at a job's current state
    pub fn try_get(&self, handle: &JobHandle) -> Option<JobState> {
        self.jobs.get(handle).map(|record| record.state.clone())
    }

    /// Drop finished jobs older than the retention period
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let ttl = self.config.result_ttl;
        let before = self.jobs.len();

        self.jobs.retain(|_, record| match record.finished_at {
            Some(finished_at) => (now - finished_at)
                .to_std()
                .map(|age| age < ttl)
                .unwrap_or(true),
            None => true,
        });

        let removed = before.saturating_sub(self.jobs.len());
        if removed > 0 {
            debug!(removed, "Evicted expired jobs");
        }
        removed
    }

    /// Periodically evict expired jobs
    pub fn start_sweeper(self: &Arc<Self>, interval_secs: u64) -> JoinHandle<()> {
        let executor = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
            loop {
                ticker.tick().await;
                executor.sweep_expired();
            }
        })
    }

    pub fn stats(&self) -> ExecutorStats {
        let mut stats = ExecutorStats {
            pending: 0,
            ready: 0,
            failed: 0,
            submitted: self.submitted_count.load(Ordering::Relaxed),
            completed: self.completed_count.load(Ordering::Relaxed),
            max_in_flight: self.config.max_in_flight,
            available_permits: self.semaphore.available_permits(),
        };

        for record in self.jobs.iter() {
            match record.state {
                JobState::Pending => stats.pending += 1,
                JobState::Ready(_) => stats.ready += 1,
                JobState::Failed(_) => stats.failed += 1,
            }
        }

        stats
    }
}

impl Default for JobExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one worker call. The deadline covers waiting for a free slot as well
/// as the call itself.
async fn invoke(
    semaphore: &Semaphore,
    timeout: Duration,
    worker: Arc<dyn ImageWorker>,
    request: WorkerRequest,
) -> Result<GenerationResult> {
    let deadline = Instant::now() + timeout;
    let model_id = worker.profile().model_id.clone();

    let _permit = match tokio::time::timeout_at(deadline, semaphore.acquire()).await {
        Ok(permit) => permit.map_err(|_| AppError::Internal("Job executor is shut down".to_string()))?,
        Err(_) => {
            return Err(AppError::WorkerUnavailable(format!(
                "No free worker slot for '{}' within {}s",
                model_id,
                timeout.as_secs()
            )))
        }
    };

    match tokio::time::timeout_at(deadline, worker.generate(request)).await {
        Ok(result) => result,
        Err(_) => Err(AppError::InferenceFailure(format!(
            "Worker for '{}' did not finish within {}s",
            model_id,
            timeout.as_secs()
        ))),
    }
}

/// Executor statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecutorStats {
    pub pending: usize,
    pub ready: usize,
    pub failed: usize,
    pub submitted: u64,
    pub completed: u64,
    pub max_in_flight: usize,
    pub available_permits: usize,
}
