//! HTTP handlers for models, generation and result polling

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::catalog::ModelDescriptor;
use crate::error::{AppError, Result};
use crate::jobs::executor::ExecutorStats;
use crate::jobs::{GenerationRequest, GenerationResult, JobAccepted, JobHandle, PollOutcome};
use crate::response::png;
use crate::worker::traits::WorkerStatus;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub workers: Vec<WorkerStatus>,
    pub jobs: ExecutorStats,
}

/// Optional image selector for multi-image results
#[derive(Debug, Default, Deserialize)]
pub struct ResultQuery {
    #[serde(default)]
    pub index: Option<usize>,
}

fn select_image(result: &GenerationResult, index: usize) -> Result<Response> {
    let image = result.image(index).cloned().ok_or_else(|| {
        AppError::InvalidRequest(format!(
            "image index {} out of range; job produced {} image(s)",
            index,
            result.len()
        ))
    })?;
    Ok(png::image_response(result, image))
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let workers: Vec<WorkerStatus> = state
        .registry
        .workers()
        .iter()
        .map(|worker| {
            let mut status = worker.status();
            status.healthy = status.healthy && state.health_monitor.is_healthy(&status.model_id);
            status
        })
        .collect();

    let status = if workers.iter().all(|w| w.healthy) {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        workers,
        jobs: state.executor.stats(),
    })
}

pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<Vec<ModelDescriptor>> {
    Json(state.catalog.list().to_vec())
}

pub async fn start_job(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<GenerationRequest>, JsonRejection>,
) -> Result<Json<JobAccepted>> {
    let Json(request) = body.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    let job_id = state.dispatcher.generate_async(request)?;
    Ok(Json(JobAccepted { job_id }))
}

pub async fn generate(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<GenerationRequest>, QueryRejection>,
) -> Result<Response> {
    let Query(request) = query.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    let result = state.dispatcher.generate_sync(request).await?;
    select_image(&result, 0)
}

pub async fn generate_async(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<GenerationRequest>, QueryRejection>,
) -> Result<Json<JobAccepted>> {
    let Query(request) = query.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    let job_id = state.dispatcher.generate_async(request)?;
    Ok(Json(JobAccepted { job_id }))
}

/// `200 image/png` when ready, `202` with an empty body while pending
pub async fn get_result(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
    query: std::result::Result<Query<ResultQuery>, QueryRejection>,
) -> Result<Response> {
    let Query(query) = query.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    match state.poller.poll(&JobHandle::from(job_id))? {
        PollOutcome::Pending => Ok(StatusCode::ACCEPTED.into_response()),
        PollOutcome::Ready(result) => select_image(&result, query.index.unwrap_or(0)),
    }
}
