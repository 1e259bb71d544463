use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

use crate::models::task::{TaskRecord, TaskStatus};

/// Re-submissions remember at most this many superseded task ids.
pub const MAX_TASK_HISTORY: usize = 5;

/// One logical unit of work as listed in a batch input file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchInput {
    pub id: String,
    pub video_url: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// Ledger row linking a logical id to its current task.
///
/// Status, progress and message mirror the referenced task as of the last
/// reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchEntry {
    pub id: String,
    pub video_url: String,
    pub category: Option<String>,
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,

    pub task_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub previous_task_ids: Vec<Uuid>,

    pub status: TaskStatus,
    pub progress: f64,
    pub message: String,

    pub submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub processing_secs: Option<f64>,
    pub output_id: Option<String>,
    pub output_location: Option<PathBuf>,
    pub error: Option<String>,
}

impl BatchEntry {
    pub fn from_input(input: BatchInput) -> Self {
        Self {
            id: input.id,
            video_url: input.video_url,
            category: input.category,
            label: input.label,
            metadata: input.metadata,
            task_id: None,
            previous_task_ids: Vec::new(),
            status: TaskStatus::Pending,
            progress: 0.0,
            message: "Not submitted".to_string(),
            submitted_at: None,
            completed_at: None,
            processing_secs: None,
            output_id: None,
            output_location: None,
            error: None,
        }
    }

    /// An entry is active while its task can still change state.
    pub fn is_active(&self) -> bool {
        self.task_id.is_some() && !self.status.is_terminal()
    }

    /// Record a newly accepted task.
    pub fn attach_task(&mut self, task_id: Uuid, status: TaskStatus, now: DateTime<Utc>) {
        self.task_id = Some(task_id);
        self.status = status;
        self.progress = 0.0;
        self.message = "Submitted".to_string();
        self.submitted_at = Some(now);
        self.error = None;
    }

    /// Point the entry at a replacement task and clear terminal fields.
    pub fn replace_task(&mut self, task_id: Uuid, now: DateTime<Utc>) {
        if let Some(previous) = self.task_id.take() {
            self.previous_task_ids.push(previous);
            if self.previous_task_ids.len() > MAX_TASK_HISTORY {
                let excess = self.previous_task_ids.len() - MAX_TASK_HISTORY;
                self.previous_task_ids.drain(..excess);
            }
        }
        self.task_id = Some(task_id);
        self.status = TaskStatus::Processing;
        self.progress = 0.0;
        self.message = "Resubmitted".to_string();
        self.submitted_at = Some(now);
        self.completed_at = None;
        self.processing_secs = None;
        self.output_id = None;
        self.output_location = None;
        self.error = None;
    }

    /// Copy the task's state into the mirror.
    ///
    /// Terminal mirrors are never touched, and a reported status behind the
    /// mirrored one is ignored. Returns true when the mirrored status changed.
    pub fn mirror(&mut self, task: &TaskRecord, output_root: Option<&Path>) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        self.progress = task.progress;
        self.message = task.message.clone();
        if !self.status.can_transition_to(task.status) {
            return false;
        }

        self.status = task.status;
        if task.status.is_terminal() {
            self.completed_at = Some(task.updated_at);
            let elapsed = task.updated_at - task.created_at;
            self.processing_secs = Some(elapsed.num_milliseconds().max(0) as f64 / 1000.0);
        }

        match task.status {
            TaskStatus::Completed => {
                self.output_id = task.output_id.clone();
                self.output_location = task
                    .output_id
                    .as_deref()
                    .and_then(|id| resolve_output_location(output_root, id));
                self.error = None;
            }
            TaskStatus::Failed => {
                self.error = Some(task.error.clone().unwrap_or_else(|| task.message.clone()));
            }
            TaskStatus::Pending | TaskStatus::Processing => {}
        }
        true
    }
}

/// An output id must name exactly one directory: no separators, no `.` or `..`.
pub fn is_safe_output_id(output_id: &str) -> bool {
    let mut components = Path::new(output_id).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !output_id.contains(['/', '\\'])
}

/// Where a completed task's artifacts live, or `None` for an id that would
/// escape the output root.
pub fn resolve_output_location(output_root: Option<&Path>, output_id: &str) -> Option<PathBuf> {
    if !is_safe_output_id(output_id) {
        return None;
    }
    Some(match output_root {
        Some(root) => root.join(output_id),
        None => PathBuf::from(output_id),
    })
}

/// A durable, ordered collection of batch entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Batch {
    pub batch_id: String,
    pub created_at: DateTime<Utc>,
    pub last_reconciled_at: Option<DateTime<Utc>>,
    /// Registry endpoint the entries were submitted to.
    pub endpoint: String,
    #[serde(default)]
    pub output_root: Option<PathBuf>,
    pub entries: Vec<BatchEntry>,
}

impl Batch {
    pub fn entry(&self, id: &str) -> Option<&BatchEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn entry_mut(&mut self, id: &str) -> Option<&mut BatchEntry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    /// True once every entry has reached COMPLETED or FAILED.
    pub fn all_terminal(&self) -> bool {
        self.entries.iter().all(|e| e.status.is_terminal())
    }
}
