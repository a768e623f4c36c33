//! Worker abstraction shared by every servable model

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::jobs::types::{GenerationRequest, GenerationResult};

/// Default inference step count when neither the request nor the model sets one
pub const DEFAULT_ITERATIONS: u32 = 50;

/// Default guidance scale when neither the request nor the model sets one
pub const DEFAULT_GUIDANCE: f64 = 3.5;

/// Base pipeline family a worker runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineKind {
    #[serde(rename = "flux")]
    Flux,
    #[serde(rename = "stable-diffusion-3")]
    StableDiffusion3,
    #[serde(rename = "auto-text2image")]
    AutoText2Image,
    #[serde(rename = "diffusion")]
    Diffusion,
}

impl PipelineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineKind::Flux => "flux",
            PipelineKind::StableDiffusion3 => "stable-diffusion-3",
            PipelineKind::AutoText2Image => "auto-text2image",
            PipelineKind::Diffusion => "diffusion",
        }
    }
}

/// LoRA adapter applied on top of the base pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoraAdapter {
    /// Hub repository holding the adapter weights
    pub repo: String,
    /// Specific weight file inside the repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_name: Option<String>,
}

/// Per-model inference parameters used when a request leaves them unset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceDefaults {
    #[serde(default)]
    pub iterations: Option<u32>,
    #[serde(default)]
    pub guidance: Option<f64>,
}

/// Everything that distinguishes one model's worker from another
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerProfile {
    pub model_id: String,
    pub pipeline: PipelineKind,
    pub adapter: Option<LoraAdapter>,
    pub defaults: InferenceDefaults,
}

/// Fully resolved parameters handed to a worker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerRequest {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub num_inference_steps: u32,
    pub guidance_scale: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<f64>,
    pub num_images: u32,
}

impl WorkerRequest {
    /// Resolve a client request against a worker profile.
    ///
    /// Explicit request values win, then the model's defaults, then the
    /// gateway-wide defaults.
    pub fn resolve(request: &GenerationRequest, profile: &WorkerProfile) -> Self {
        Self {
            prompt: request.prompt.clone(),
            width: request.width,
            height: request.height,
            num_inference_steps: request
                .iterations
                .or(profile.defaults.iterations)
                .unwrap_or(DEFAULT_ITERATIONS),
            guidance_scale: request
                .guidance
                .or(profile.defaults.guidance)
                .unwrap_or(DEFAULT_GUIDANCE),
            seed: request.seed,
            num_images: request.number_images,
        }
    }
}

/// Snapshot of a worker for the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatus {
    pub model_id: String,
    pub pipeline: PipelineKind,
    pub endpoints: Vec<String>,
    pub healthy: bool,
}

/// A unit holding one loaded generation pipeline
#[async_trait]
pub trait ImageWorker: Send + Sync {
    /// Static description of what this worker runs
    fn profile(&self) -> &WorkerProfile;

    /// Addresses this worker can be reached at
    fn endpoints(&self) -> Vec<String>;

    /// Produce PNG images for a resolved request
    async fn generate(&self, request: WorkerRequest) -> Result<GenerationResult>;

    /// Probe the worker's endpoints
    async fn health_check(&self) -> bool;

    /// Whether at least one endpoint is currently usable
    fn is_healthy(&self) -> bool {
        true
    }

    fn status(&self) -> WorkerStatus {
        let profile = self.profile();
        WorkerStatus {
            model_id: profile.model_id.clone(),
            pipeline: profile.pipeline,
            endpoints: self.endpoints(),
            healthy: self.is_healthy(),
        }
    }
}

/// Worker endpoint with health status
#[derive(Debug, Clone)]
pub struct WorkerEndpoint {
    pub url: String,
    pub healthy: bool,
    pub last_check: Option<std::time::Instant>,
    pub consecutive_failures: u32,
}

impl WorkerEndpoint {
    /// Failures in a row before an endpoint is taken out of rotation
    pub const FAILURE_THRESHOLD: u32 = 3;

    pub fn new(url: String) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            healthy: true,
            last_check: None,
            consecutive_failures: 0,
        }
    }

    pub fn mark_healthy(&mut self) {
        self.healthy = true;
        self.last_check = Some(std::time::Instant::now());
        self.consecutive_failures = 0;
    }

    pub fn mark_unhealthy(&mut self) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= Self::FAILURE_THRESHOLD {
            self.healthy = false;
        }
        self.last_check = Some(std::time::Instant::now());
    }
}
