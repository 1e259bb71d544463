use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Status of a verification task in the registry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Pending,
        TaskStatus::Processing,
        TaskStatus::Completed,
        TaskStatus::Failed,
    ];

    /// COMPLETED and FAILED admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::Processing => 1,
            TaskStatus::Completed | TaskStatus::Failed => 2,
        }
    }

    /// Transitions only move forward along PENDING -> PROCESSING -> terminal.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

/// Per-task overrides handed to the verification pipeline.
///
/// Unknown keys are kept in `extra` and passed through untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_duration_secs: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_claims: Option<u32>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One verification attempt against a single video.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRecord {
    pub task_id: Uuid,
    pub video_url: String,
    #[serde(default)]
    pub config: TaskConfig,
    pub status: TaskStatus,
    pub progress: f64,
    pub message: String,
    pub output_id: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("invalid task transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: TaskStatus,
    pub to: TaskStatus,
}

impl TaskRecord {
    pub fn new(video_url: impl Into<String>, config: TaskConfig) -> Self {
        let now = Utc::now();
        Self {
            task_id: Uuid::new_v4(),
            video_url: video_url.into(),
            config,
            status: TaskStatus::Pending,
            progress: 0.0,
            message: "Task queued".to_string(),
            output_id: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn transition(&mut self, next: TaskStatus, message: String) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.message = message;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Raise progress; values are clamped to [0, 1] and never decrease.
    pub fn advance_progress(&mut self, progress: f64, message: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        let clamped = if progress.is_finite() { progress.clamp(0.0, 1.0) } else { 0.0 };
        self.progress = self.progress.max(clamped);
        self.message = message.into();
        self.updated_at = Utc::now();
    }

    pub fn start(&mut self, message: impl Into<String>) -> Result<(), InvalidTransition> {
        self.transition(TaskStatus::Processing, message.into())
    }

    pub fn complete(&mut self, output_id: String) -> Result<(), InvalidTransition> {
        self.transition(TaskStatus::Completed, "Verification complete".to_string())?;
        self.progress = 1.0;
        self.output_id = Some(output_id);
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), InvalidTransition> {
        let error = error.into();
        self.transition(TaskStatus::Failed, format!("Verification failed: {}", error))?;
        self.error = Some(error);
        Ok(())
    }
}
