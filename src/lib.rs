//! Prompt Forge Gateway
//!
//! An authenticated HTTP gateway that dispatches text-to-image requests to
//! model workers, either waiting for the image or handing back a job handle
//! the client polls until the result is ready.

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod jobs;
pub mod middleware;
pub mod response;
pub mod worker;

pub use error::{AppError, Result};

use std::sync::Arc;

use catalog::ModelCatalog;
use jobs::{executor::JobExecutor, JobDispatcher, JobPoller};
use middleware::TokenVerifier;
use worker::{health_check::HealthMonitor, registry::ModelRegistry};

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Arc<config::Settings>,
    pub registry: Arc<ModelRegistry>,
    pub catalog: Arc<ModelCatalog>,
    pub executor: Arc<JobExecutor>,
    pub dispatcher: Arc<JobDispatcher>,
    pub poller: Arc<JobPoller>,
    pub health_monitor: Arc<HealthMonitor>,
    pub verifier: Option<Arc<dyn TokenVerifier>>,
}

impl AppState {
    /// Wire the dispatch components together from already-built parts
    pub fn new(
        settings: config::Settings,
        registry: ModelRegistry,
        catalog: ModelCatalog,
        verifier: Option<Arc<dyn TokenVerifier>>,
    ) -> Self {
        let registry = Arc::new(registry);
        let executor = Arc::new(JobExecutor::with_config((&settings.jobs).into()));

        Self {
            dispatcher: Arc::new(JobDispatcher::new(registry.clone(), executor.clone())),
            poller: Arc::new(JobPoller::new(executor.clone())),
            health_monitor: Arc::new(HealthMonitor::new(registry.clone())),
            settings: Arc::new(settings),
            registry,
            catalog: Arc::new(catalog),
            executor,
            verifier,
        }
    }
}
