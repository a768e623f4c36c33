//! Route table and middleware stack

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::api::handlers;
use crate::middleware::{AuthLayer, RateLimitLayer};
use crate::AppState;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(allowed)
}

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let settings = state.settings.clone();

    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .route("/models", get(handlers::list_models))
        .route("/start-job", post(handlers::start_job))
        .route("/generate", get(handlers::generate))
        .route("/generate-async", get(handlers::generate_async))
        .route("/result/:job_id", get(handlers::get_result))
        .with_state(state.clone())
        .layer(AuthLayer::from_verifier(state.verifier.clone()));

    if settings.rate_limit.enabled {
        router = router.layer(RateLimitLayer::from_config(&settings.rate_limit));
    }

    router
        .layer(cors_layer(&settings.server.cors_origins))
        .layer(TraceLayer::new_for_http())
}
