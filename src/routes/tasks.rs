use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::task::TaskRecord;
use crate::models::verification::{ErrorResponse, SubmitTaskRequest, SubmitTaskResponse};
use crate::services::registry::RegistryError;

/// POST /api/v1/tasks: Submit a video for claim verification.
pub async fn submit_task(
    State(state): State<AppState>,
    Json(request): Json<SubmitTaskRequest>,
) -> Result<(StatusCode, Json<SubmitTaskResponse>), (StatusCode, Json<ErrorResponse>)> {
    let record = state.registry.submit(request).await.map_err(|e| {
        tracing::info!(error = %e, "Submission rejected");
        (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(e.to_string())))
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitTaskResponse {
            task_id: record.task_id,
            status: record.status,
            message: "Video submitted for verification".to_string(),
        }),
    ))
}

/// GET /api/v1/tasks/{task_id}: Current state of one task.
pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<TaskRecord>, (StatusCode, Json<ErrorResponse>)> {
    match state.registry.poll(task_id).await {
        Ok(record) => Ok(Json(record)),
        Err(RegistryError::NotFound(_)) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("task not found")),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(e.to_string())),
        )),
    }
}

/// GET /api/v1/tasks: All tasks, newest first.
pub async fn list_tasks(State(state): State<AppState>) -> Json<Vec<TaskRecord>> {
    Json(state.registry.list().await)
}
