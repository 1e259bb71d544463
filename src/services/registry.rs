//! In-process task registry.
//!
//! Holds every task record in a single map guarded by one lock. Each accepted
//! submission gets a tokio task that waits for a concurrency permit, marks the
//! record PROCESSING and runs the blocking pipeline on the blocking pool. Only
//! that task writes to its record after submission.

use async_trait::async_trait;
use garde::Validate;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, Semaphore};
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::task::{InvalidTransition, TaskConfig, TaskRecord, TaskStatus};
use crate::models::verification::{SubmitTaskRequest, SubmitTaskResponse};
use crate::services::pipeline::VerificationPipeline;
use crate::services::source::{LookupError, StatusSource, SubmitError, TaskSubmitter};

/// Progress recorded when a task leaves the queue.
const PROGRESS_STARTED: f64 = 0.05;

/// Progress recorded just before the pipeline call.
const PROGRESS_PIPELINE: f64 = 0.1;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RegistryError {
    #[error("Task {0} not found")]
    NotFound(Uuid),

    #[error("Task {task_id} did not finish within {waited:?}")]
    Timeout { task_id: Uuid, waited: Duration },
}

struct RegistryInner {
    tasks: RwLock<HashMap<Uuid, TaskRecord>>,
    pipeline: Arc<dyn VerificationPipeline>,
    permits: Arc<Semaphore>,
}

/// Process-local store of verification tasks. Cloning shares the store.
#[derive(Clone)]
pub struct TaskRegistry {
    inner: Arc<RegistryInner>,
}

impl TaskRegistry {
    pub fn new(pipeline: Arc<dyn VerificationPipeline>, max_concurrent: usize) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                tasks: RwLock::new(HashMap::new()),
                pipeline,
                permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            }),
        }
    }

    /// Validate and accept a submission. Returns as soon as the PENDING
    /// record exists; execution happens in the background.
    pub async fn submit(&self, request: SubmitTaskRequest) -> Result<TaskRecord, SubmitError> {
        request
            .validate()
            .map_err(|report| SubmitError::Invalid(report.to_string()))?;

        let mut record = TaskRecord::new(request.video_url, request.config.unwrap_or_default());
        {
            let mut tasks = self.inner.tasks.write().await;
            while tasks.contains_key(&record.task_id) {
                record.task_id = Uuid::new_v4();
            }
            tasks.insert(record.task_id, record.clone());
        }

        metrics::counter!("verification_tasks_submitted_total").increment(1);
        info!(task_id = %record.task_id, video_url = %record.video_url, "Task submitted");

        let registry = self.clone();
        let task_id = record.task_id;
        tokio::spawn(async move {
            registry.execute(task_id).await;
        });

        Ok(record)
    }

    /// Current record for `task_id`.
    pub async fn poll(&self, task_id: Uuid) -> Result<TaskRecord, RegistryError> {
        self.inner
            .tasks
            .read()
            .await
            .get(&task_id)
            .cloned()
            .ok_or(RegistryError::NotFound(task_id))
    }

    /// All records, newest first.
    pub async fn list(&self) -> Vec<TaskRecord> {
        let mut records: Vec<TaskRecord> =
            self.inner.tasks.read().await.values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    /// Number of tasks in each status.
    pub async fn counts(&self) -> HashMap<TaskStatus, usize> {
        let mut counts: HashMap<TaskStatus, usize> =
            TaskStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for task in self.inner.tasks.read().await.values() {
            *counts.entry(task.status).or_insert(0) += 1;
        }
        counts
    }

    /// Poll until the task is terminal, failing once `max_wait` has elapsed.
    pub async fn wait_for_terminal(
        &self,
        task_id: Uuid,
        max_wait: Duration,
        poll_interval: Duration,
    ) -> Result<TaskRecord, RegistryError> {
        let deadline = tokio::time::Instant::now() + max_wait;
        loop {
            let task = self.poll(task_id).await?;
            if task.status.is_terminal() {
                return Ok(task);
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Err(RegistryError::Timeout {
                    task_id,
                    waited: max_wait,
                });
            }
            tokio::time::sleep(poll_interval.min(deadline - now)).await;
        }
    }

    async fn with_task<R>(&self, task_id: Uuid, f: impl FnOnce(&mut TaskRecord) -> R) -> Option<R> {
        let mut tasks = self.inner.tasks.write().await;
        tasks.get_mut(&task_id).map(f)
    }

    /// Run the single execution attempt for a task.
    async fn execute(&self, task_id: Uuid) {
        let _permit = match Arc::clone(&self.inner.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                self.finish(task_id, Err("Registry is shutting down".to_string())).await;
                return;
            }
        };

        let started = self
            .with_task(task_id, |task| {
                task.start("Preparing verification")?;
                task.advance_progress(PROGRESS_STARTED, "Preparing verification");
                task.advance_progress(PROGRESS_PIPELINE, "Running verification pipeline");
                Ok::<_, InvalidTransition>((
                    task.video_url.clone(),
                    task.config.clone(),
                ))
            })
            .await;

        let (video_url, config) = match started {
            Some(Ok(input)) => input,
            Some(Err(e)) => {
                warn!(task_id = %task_id, error = %e, "Task could not be started");
                return;
            }
            None => {
                warn!(task_id = %task_id, "Task vanished before execution");
                return;
            }
        };

        info!(task_id = %task_id, "Running verification pipeline");
        metrics::gauge!("verification_tasks_active").increment(1.0);
        let clock = Instant::now();

        let outcome = self.run_pipeline(video_url, config).await;

        metrics::gauge!("verification_tasks_active").decrement(1.0);
        metrics::histogram!("verification_task_duration_seconds")
            .record(clock.elapsed().as_secs_f64());

        self.finish(task_id, outcome).await;
    }

    async fn run_pipeline(&self, video_url: String, config: TaskConfig) -> Result<String, String> {
        let pipeline = Arc::clone(&self.inner.pipeline);
        let joined = tokio::task::spawn_blocking(move || pipeline.run(&video_url, &config)).await;

        match joined {
            Ok(Ok(output)) => output
                .resolve_output_id()
                .ok_or_else(|| "Pipeline returned no output identifier".to_string()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) => Err(format!("Pipeline worker panicked: {}", e)),
        }
    }

    async fn finish(&self, task_id: Uuid, outcome: Result<String, String>) {
        let applied = self
            .with_task(task_id, |task| match &outcome {
                Ok(output_id) => task.complete(output_id.clone()),
                Err(error) => task.fail(error.clone()),
            })
            .await;

        match (&outcome, applied) {
            (Ok(output_id), Some(Ok(()))) => {
                metrics::counter!("verification_tasks_completed_total").increment(1);
                info!(task_id = %task_id, output_id = %output_id, "Task completed");
            }
            (Err(error), Some(Ok(()))) => {
                metrics::counter!("verification_tasks_failed_total").increment(1);
                warn!(task_id = %task_id, error = %error, "Task failed");
            }
            (_, Some(Err(e))) => {
                warn!(task_id = %task_id, error = %e, "Ignoring result for finished task");
            }
            (_, None) => {
                warn!(task_id = %task_id, "Result for unknown task dropped");
            }
        }
    }
}

#[async_trait]
impl StatusSource for TaskRegistry {
    async fn lookup(&self, task_id: Uuid) -> Result<TaskRecord, LookupError> {
        self.poll(task_id)
            .await
            .map_err(|_| LookupError::NotFound(task_id))
    }
}

#[async_trait]
impl TaskSubmitter for TaskRegistry {
    async fn submit(
        &self,
        video_url: &str,
        config: &TaskConfig,
    ) -> Result<SubmitTaskResponse, SubmitError> {
        let request = SubmitTaskRequest {
            video_url: video_url.to_string(),
            config: Some(config.clone()),
        };
        let record = TaskRegistry::submit(self, request).await?;
        Ok(SubmitTaskResponse {
            task_id: record.task_id,
            status: record.status,
            message: record.message,
        })
    }
}
