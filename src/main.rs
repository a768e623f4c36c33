//! Main entry point for the Prompt Forge gateway

use prompt_forge_gateway::{
    api,
    catalog::ModelCatalog,
    config::{LoggingConfig, Settings},
    middleware::jwt::build_verifier,
    worker::registry::ModelRegistry,
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);

    if config.format.eq_ignore_ascii_case("json") {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    init_logging(&settings.logging);
    settings.validate()?;

    info!(
        "Loaded configuration: server={}:{}, models={}",
        settings.server.host,
        settings.server.port,
        settings.models.len()
    );

    let registry = ModelRegistry::from_config(
        &settings.models,
        Duration::from_secs(settings.jobs.timeout_secs),
    )?;
    let catalog = ModelCatalog::load(&settings.models, &settings.catalog.assets_dir).await;
    let verifier = build_verifier(&settings.auth)?;

    let health_interval = settings
        .models
        .iter()
        .map(|m| m.health_check_interval_secs)
        .min()
        .unwrap_or(30);
    let sweep_interval = settings.jobs.sweep_interval_secs;
    let addr = format!("{}:{}", settings.server.host, settings.server.port);

    let app_state = Arc::new(AppState::new(settings, registry, catalog, verifier));

    app_state.health_monitor.start(health_interval).await;
    app_state.executor.start_sweeper(sweep_interval);

    let app = api::routes::create_router(app_state.clone());

    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    app_state.health_monitor.stop().await;

    Ok(())
}
