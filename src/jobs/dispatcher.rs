//! Job dispatcher: resolves requests to workers and runs them

use std::sync::Arc;
use tracing::{debug, info};

use crate::error::Result;
use crate::jobs::executor::JobExecutor;
use crate::jobs::types::{GenerationRequest, GenerationResult, JobHandle};
use crate::worker::registry::ModelRegistry;
use crate::worker::traits::{ImageWorker, WorkerRequest};

/// Entry point for both synchronous and asynchronous generation
pub struct JobDispatcher {
    registry: Arc<ModelRegistry>,
    executor: Arc<JobExecutor>,
}

impl JobDispatcher {
    pub fn new(registry: Arc<ModelRegistry>, executor: Arc<JobExecutor>) -> Self {
        Self { registry, executor }
    }

    /// Validate and resolve a request; nothing reaches a worker unless this succeeds
    fn prepare(&self, request: &GenerationRequest) -> Result<(Arc<dyn ImageWorker>, WorkerRequest)> {
        request.validate()?;
        let worker = self.registry.resolve(&request.model_id)?;
        let resolved = WorkerRequest::resolve(request, worker.profile());
        Ok((worker, resolved))
    }

    /// Generate and wait for the images
    pub async fn generate_sync(&self, request: GenerationRequest) -> Result<GenerationResult> {
        let (worker, resolved) = self.prepare(&request)?;

        debug!(model = %request.model_id, "Running synchronous generation");
        let result = self.executor.run(worker, resolved).await?;
        info!(model = %request.model_id, images = result.len(), "Synchronous generation finished");

        Ok(result)
    }

    /// Submit a generation job and return its handle without waiting
    pub fn generate_async(&self, request: GenerationRequest) -> Result<JobHandle> {
        let (worker, resolved) = self.prepare(&request)?;
        let handle = self.executor.submit(worker, resolved);

        info!(job_id = %handle, model = %request.model_id, "Generation job accepted");
        Ok(handle)
    }
}
