use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::models::task::TaskStatus;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub registry: RegistryHealth,
}

#[derive(Serialize)]
pub struct RegistryHealth {
    pub status: String,
    pub total_tasks: usize,
    pub active_tasks: usize,
    pub failed_tasks: usize,
    pub latency_ms: u64,
}

/// GET /health: Liveness plus registry task counts.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let start = std::time::Instant::now();
    let counts = state.registry.counts().await;
    let count = |s: TaskStatus| counts.get(&s).copied().unwrap_or(0);

    let registry = RegistryHealth {
        status: "ok".to_string(),
        total_tasks: counts.values().sum(),
        active_tasks: count(TaskStatus::Pending) + count(TaskStatus::Processing),
        failed_tasks: count(TaskStatus::Failed),
        latency_ms: start.elapsed().as_millis() as u64,
    };

    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks { registry },
    };

    (StatusCode::OK, Json(response))
}
