use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use video_claim_verify::{
    app_state::AppState,
    config::AppConfig,
    routes,
    services::{pipeline::CommandPipeline, registry::TaskRegistry},
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing video-claim-verify server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);
    routes::metrics::describe_task_metrics();

    tracing::info!(
        command = %config.pipeline_command,
        max_concurrent = config.max_concurrent_tasks,
        "Configuring verification pipeline"
    );
    let pipeline = CommandPipeline::new(
        config.pipeline_command.clone(),
        config.pipeline_args.clone(),
        config.output_root.clone(),
    );
    let registry = TaskRegistry::new(Arc::new(pipeline), config.max_concurrent_tasks);
    let state = AppState::new(registry);

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route(
            "/api/v1/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::submit_task),
        )
        .route("/api/v1/tasks/{task_id}", get(routes::tasks::get_task))
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(64 * 1024)); // 64 KB limit

    tracing::info!("Starting video-claim-verify on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
