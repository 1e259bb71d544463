//! Seams between the batch layer and whatever registry it talks to.
//!
//! The in-process `TaskRegistry` and the HTTP `RemoteRegistry` both
//! implement these, so batches can be driven locally or over the network.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::task::{TaskConfig, TaskRecord};
use crate::models::verification::SubmitTaskResponse;

/// Looks up the authoritative state of a task.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn lookup(&self, task_id: Uuid) -> Result<TaskRecord, LookupError>;
}

/// Accepts new verification tasks.
#[async_trait]
pub trait TaskSubmitter: Send + Sync {
    async fn submit(
        &self,
        video_url: &str,
        config: &TaskConfig,
    ) -> Result<SubmitTaskResponse, SubmitError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("Task {0} not found")]
    NotFound(Uuid),

    #[error("Status request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Registry returned status {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Invalid submission: {0}")]
    Invalid(String),

    #[error("Submission request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Registry rejected submission ({status}): {body}")]
    Rejected { status: u16, body: String },
}
