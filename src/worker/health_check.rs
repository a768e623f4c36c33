//! Background health monitoring of model workers

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::worker::registry::ModelRegistry;

/// Health status of a worker
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    pub last_check: std::time::Instant,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self {
            healthy: true,
            last_check: std::time::Instant::now(),
            consecutive_failures: 0,
            consecutive_successes: 0,
        }
    }
}

impl HealthStatus {
    fn record(&mut self, passed: bool, failure_threshold: u32, recovery_threshold: u32) {
        self.last_check = std::time::Instant::now();

        if passed {
            self.consecutive_failures = 0;
            self.consecutive_successes += 1;
            if !self.healthy && self.consecutive_successes >= recovery_threshold {
                self.healthy = true;
            }
        } else {
            self.consecutive_successes = 0;
            self.consecutive_failures += 1;
            if self.healthy && self.consecutive_failures >= failure_threshold {
                self.healthy = false;
            }
        }
    }
}

/// Periodically probes every worker in the registry
pub struct HealthMonitor {
    registry: Arc<ModelRegistry>,
    health_status: Arc<DashMap<String, HealthStatus>>,
    check_task: RwLock<Option<JoinHandle<()>>>,
    failure_threshold: u32,
    recovery_threshold: u32,
}

impl HealthMonitor {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            health_status: Arc::new(DashMap::new()),
            check_task: RwLock::new(None),
            failure_threshold: 3,
            recovery_threshold: 2,
        }
    }

    /// Start the background probe loop
    pub async fn start(&self, interval_secs: u64) {
        let registry = self.registry.clone();
        let health_status = self.health_status.clone();
        let failure_threshold = self.failure_threshold;
        let recovery_threshold = self.recovery_threshold;

        let handle = tokio::spawn(async move {
            let interval = Duration::from_secs(interval_secs.max(1));

            loop {
                for worker in registry.workers() {
                    let model_id = worker.profile().model_id.clone();
                    let passed = worker.health_check().await;

                    let mut status = health_status.entry(model_id.clone()).or_default();
                    let was_healthy = status.healthy;
                    status.record(passed, failure_threshold, recovery_threshold);

                    match (was_healthy, status.healthy) {
                        (true, false) => warn!(
                            model = %model_id,
                            failures = status.consecutive_failures,
                            "Worker marked unhealthy after consecutive failures"
                        ),
                        (false, true) => info!(model = %model_id, "Worker recovered"),
                        _ => debug!(model = %model_id, healthy = status.healthy, "Health check completed"),
                    }
                }

                tokio::time::sleep(interval).await;
            }
        });

        *self.check_task.write().await = Some(handle);
        info!(interval_secs = interval_secs, "Started worker health monitor");
    }

    pub async fn stop(&self) {
        if let Some(handle) = self.check_task.write().await.take() {
            handle.abort();
            info!("Stopped worker health monitor");
        }
    }

    /// Assumes healthy until a probe says otherwise
    pub fn is_healthy(&self, model_id: &str) -> bool {
        self.health_status
            .get(model_id)
            .map(|s| s.healthy)
            .unwrap_or(true)
    }
}
