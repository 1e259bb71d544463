use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Register descriptions for the task metrics recorded by the registry.
pub fn describe_task_metrics() {
    metrics::describe_counter!(
        "verification_tasks_submitted_total",
        "Total verification tasks accepted"
    );
    metrics::describe_counter!(
        "verification_tasks_completed_total",
        "Total verification tasks completed"
    );
    metrics::describe_counter!(
        "verification_tasks_failed_total",
        "Total verification tasks that failed"
    );
    metrics::describe_histogram!(
        "verification_task_duration_seconds",
        "Wall time of one pipeline invocation"
    );
    metrics::describe_gauge!(
        "verification_tasks_active",
        "Tasks currently running the pipeline"
    );
}

/// Prometheus metrics scrape endpoint.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}
