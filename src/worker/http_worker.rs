//! HTTP worker client implementation

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ModelConfig;
use crate::error::{AppError, Result};
use crate::jobs::types::GenerationResult;
use crate::response::{base64, png};
use crate::worker::traits::{
    ImageWorker, LoraAdapter, PipelineKind, WorkerEndpoint, WorkerProfile, WorkerRequest,
};

/// Upper bound for one health probe, independent of the generation timeout
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Worker reached over HTTP, round-robining across its endpoints
pub struct HttpWorker {
    profile: WorkerProfile,
    client: Client,
    endpoints: Arc<RwLock<Vec<WorkerEndpoint>>>,
    health_check_path: String,
    current_endpoint_index: Arc<RwLock<usize>>,
}

/// Body posted to `{endpoint}/generate`
#[derive(Debug, Serialize)]
struct WireGenerateRequest<'a> {
    pipeline: PipelineKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    adapter: Option<&'a LoraAdapter>,
    #[serde(flatten)]
    request: &'a WorkerRequest,
}

/// JSON answer from a worker; `images` and `data` are both accepted
#[derive(Debug, Deserialize)]
struct WireGenerateResponse {
    #[serde(default)]
    images: Vec<WireImage>,
    #[serde(default)]
    data: Vec<WireImage>,
}

#[derive(Debug, Deserialize)]
struct WireImage {
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    base64: Option<String>,
}

impl HttpWorker {
    /// Create a worker from a model's configuration.
    ///
    /// `timeout` bounds every generation call made through this worker.
    pub fn new(config: &ModelConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        let endpoints: Vec<WorkerEndpoint> = config
            .endpoints
            .iter()
            .map(|url| WorkerEndpoint::new(url.clone()))
            .collect();

        Ok(Self {
            profile: WorkerProfile {
                model_id: config.id.clone(),
                pipeline: config.pipeline,
                adapter: config.adapter.clone(),
                defaults: config.defaults.clone(),
            },
            client,
            endpoints: Arc::new(RwLock::new(endpoints)),
            health_check_path: config.health_check_path.clone(),
            current_endpoint_index: Arc::new(RwLock::new(0)),
        })
    }

    /// Get the next healthy endpoint using round-robin
    fn get_next_endpoint(&self) -> Option<String> {
        let endpoints = self.endpoints.read();
        let healthy_endpoints: Vec<_> = endpoints.iter().filter(|e| e.healthy).collect();

        if healthy_endpoints.is_empty() {
            return None;
        }

        let mut index = self.current_endpoint_index.write();
        *index = (*index + 1) % healthy_endpoints.len();
        Some(healthy_endpoints[*index].url.clone())
    }

    fn mark_endpoint_unhealthy(&self, url: &str) {
        let mut endpoints = self.endpoints.write();
        if let Some(endpoint) = endpoints.iter_mut().find(|e| e.url == url) {
            endpoint.mark_unhealthy();
            warn!(model = %self.profile.model_id, url = %url, "Worker endpoint failed");
        }
    }

    fn mark_endpoint_healthy(&self, url: &str) {
        let mut endpoints = self.endpoints.write();
        if let Some(endpoint) = endpoints.iter_mut().find(|e| e.url == url) {
            endpoint.mark_healthy();
            debug!(model = %self.profile.model_id, url = %url, "Worker endpoint healthy");
        }
    }

    /// Turn a successful worker response into PNG images
    async fn read_images(&self, response: reqwest::Response) -> Result<Vec<Bytes>> {
        let is_png_body = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("image/png"))
            .unwrap_or(false);

        let images = if is_png_body {
            let body = response
                .bytes()
                .await
                .map_err(|e| AppError::InferenceFailure(format!("Failed to read image body: {}", e)))?;
            vec![body]
        } else {
            let parsed: WireGenerateResponse = response
                .json()
                .await
                .map_err(|e| AppError::InferenceFailure(format!("Failed to parse response: {}", e)))?;

            parsed
                .images
                .into_iter()
                .chain(parsed.data)
                .filter_map(|img| img.b64_json.or(img.base64))
                .map(|encoded| base64::decode(&encoded).map(Bytes::from))
                .collect::<Result<Vec<_>>>()?
        };

        if images.is_empty() {
            return Err(AppError::InferenceFailure(format!(
                "Worker for '{}' returned no images",
                self.profile.model_id
            )));
        }

        if let Some(position) = images.iter().position(|img| !png::is_png(img)) {
            return Err(AppError::InferenceFailure(format!(
                "Worker for '{}' returned a non-PNG payload at index {}",
                self.profile.model_id, position
            )));
        }

        Ok(images)
    }
}

#[async_trait]
impl ImageWorker for HttpWorker {
    fn profile(&self) -> &WorkerProfile {
        &self.profile
    }

    fn endpoints(&self) -> Vec<String> {
        self.endpoints.read().iter().map(|e| e.url.clone()).collect()
    }

    async fn generate(&self, request: WorkerRequest) -> Result<GenerationResult> {
        let endpoint = self.get_next_endpoint().ok_or_else(|| {
            AppError::WorkerUnavailable(format!(
                "No healthy worker endpoints for '{}'",
                self.profile.model_id
            ))
        })?;

        debug!(
            model = %self.profile.model_id,
            endpoint = %endpoint,
            steps = request.num_inference_steps,
            "Sending generate request"
        );

        let body = WireGenerateRequest {
            pipeline: self.profile.pipeline,
            adapter: self.profile.adapter.as_ref(),
            request: &request,
        };

        let response = match self
            .client
            .post(format!("{}/generate", endpoint))
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Err(AppError::InferenceFailure(format!(
                    "Worker for '{}' timed out: {}",
                    self.profile.model_id, e
                )));
            }
            Err(e) => {
                self.mark_endpoint_unhealthy(&endpoint);
                return Err(AppError::WorkerUnavailable(format!(
                    "Connection failed to {}: {}",
                    endpoint, e
                )));
            }
        };

        let status = response.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            self.mark_endpoint_unhealthy(&endpoint);
            return Err(AppError::WorkerUnavailable(format!(
                "Worker at {} is not ready",
                endpoint
            )));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::InferenceFailure(format!(
                "Worker returned {}: {}",
                status, body
            )));
        }

        let images = self.read_images(response).await?;
        self.mark_endpoint_healthy(&endpoint);

        Ok(GenerationResult::new(images))
    }

    async fn health_check(&self) -> bool {
        let endpoints = self.endpoints.read().clone();
        let mut any_healthy = false;

        for endpoint in &endpoints {
            let url = format!("{}{}", endpoint.url, self.health_check_path);

            match self.client.get(&url).timeout(HEALTH_CHECK_TIMEOUT).send().await {
                Ok(response) if response.status().is_success() => {
                    self.mark_endpoint_healthy(&endpoint.url);
                    any_healthy = true;
                }
                Ok(response) => {
                    self.mark_endpoint_unhealthy(&endpoint.url);
                    debug!(
                        model = %self.profile.model_id,
                        endpoint = %endpoint.url,
                        status = %response.status(),
                        "Health check failed"
                    );
                }
                Err(e) => {
                    self.mark_endpoint_unhealthy(&endpoint.url);
                    debug!(
                        model = %self.profile.model_id,
                        endpoint = %endpoint.url,
                        error = %e,
                        "Health check failed"
                    );
                }
            }
        }

        any_healthy
    }

    fn is_healthy(&self) -> bool {
        self.endpoints.read().iter().any(|e| e.healthy)
    }
}
