use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::task::{TaskConfig, TaskStatus};

/// Request to submit a video for claim verification.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitTaskRequest {
    #[garde(length(min = 1, max = 2048), pattern(r"^https?://[^\s/$.?#][^\s]*$"))]
    pub video_url: String,

    #[garde(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<TaskConfig>,
}

/// Response after submitting a video for verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitTaskResponse {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub message: String,
}

/// Body returned alongside non-2xx status codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
