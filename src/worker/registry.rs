//! Model registry mapping model identifiers to the workers that serve them

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::ModelConfig;
use crate::error::{AppError, Result};
use crate::worker::http_worker::HttpWorker;
use crate::worker::traits::ImageWorker;

enum RegistryEntry {
    Ready(Arc<dyn ImageWorker>),
    /// Known model with no worker behind it
    Unavailable,
}

/// Immutable lookup table built once at startup
#[derive(Default)]
pub struct ModelRegistry {
    entries: BTreeMap<String, RegistryEntry>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from configured models.
    ///
    /// Models marked unavailable stay resolvable as ids but never reach a worker.
    pub fn from_config(models: &[ModelConfig], timeout: Duration) -> Result<Self> {
        let mut registry = Self::new();

        for model in models {
            if model.available && !model.endpoints.is_empty() {
                registry.register(Arc::new(HttpWorker::new(model, timeout)?));
            } else {
                registry.register_unavailable(&model.id);
            }
        }

        info!(
            models = registry.entries.len(),
            workers = registry.workers().len(),
            "Model registry initialized"
        );

        Ok(registry)
    }

    /// Register a worker under its profile's model id
    pub fn register(&mut self, worker: Arc<dyn ImageWorker>) {
        let id = worker.profile().model_id.clone();
        self.entries.insert(id, RegistryEntry::Ready(worker));
    }

    pub fn register_unavailable(&mut self, model_id: &str) {
        self.entries.insert(model_id.to_string(), RegistryEntry::Unavailable);
    }

    /// Find the worker serving `model_id`
    pub fn resolve(&self, model_id: &str) -> Result<Arc<dyn ImageWorker>> {
        match self.entries.get(model_id) {
            Some(RegistryEntry::Ready(worker)) => Ok(worker.clone()),
            Some(RegistryEntry::Unavailable) => Err(AppError::WorkerUnavailable(format!(
                "Model '{}' is not currently served",
                model_id
            ))),
            None => Err(AppError::UnknownModel(model_id.to_string())),
        }
    }

    pub fn model_ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// All models that have a worker
    pub fn workers(&self) -> Vec<Arc<dyn ImageWorker>> {
        self.entries
            .values()
            .filter_map(|entry| match entry {
                RegistryEntry::Ready(worker) => Some(worker.clone()),
                RegistryEntry::Unavailable => None,
            })
            .collect()
    }
}
