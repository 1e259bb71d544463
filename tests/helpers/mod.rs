//! Test helper utilities for integration and E2E testing

use std::collections::HashMap;
use std::sync::{mpsc, Mutex};
use std::time::Duration;
use tokio::time::sleep;
use uuid::Uuid;

use video_claim_verify::models::task::{TaskConfig, TaskRecord, TaskStatus};
use video_claim_verify::services::pipeline::{PipelineError, PipelineOutput, VerificationPipeline};
use video_claim_verify::services::registry::TaskRegistry;

type Outcome = Result<PipelineOutput, String>;

/// Pipeline whose invocations block until the test releases them.
pub struct ScriptedPipeline {
    gates: Mutex<HashMap<String, mpsc::Receiver<Outcome>>>,
}

/// Test-side handle that decides how each scripted invocation ends.
pub struct PipelineScript {
    senders: HashMap<String, mpsc::Sender<Outcome>>,
}

pub fn scripted_pipeline<'a>(urls: impl IntoIterator<Item = &'a str>) -> (ScriptedPipeline, PipelineScript) {
    let mut gates = HashMap::new();
    let mut senders = HashMap::new();
    for url in urls {
        let (tx, rx) = mpsc::channel();
        gates.insert(url.to_string(), rx);
        senders.insert(url.to_string(), tx);
    }
    (
        ScriptedPipeline {
            gates: Mutex::new(gates),
        },
        PipelineScript { senders },
    )
}

impl VerificationPipeline for ScriptedPipeline {
    fn run(&self, video_url: &str, _config: &TaskConfig) -> Result<PipelineOutput, PipelineError> {
        let gate = self
            .gates
            .lock()
            .unwrap()
            .remove(video_url)
            .ok_or_else(|| PipelineError::Other(format!("unscripted video {video_url}")))?;
        match gate.recv() {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(detail)) => Err(PipelineError::Other(detail)),
            Err(_) => Err(PipelineError::Other("script dropped".to_string())),
        }
    }
}

impl PipelineScript {
    pub fn complete(&self, video_url: &str, output_id: &str) {
        self.senders[video_url]
            .send(Ok(PipelineOutput {
                output_id: Some(output_id.to_string()),
                output_dir: None,
            }))
            .unwrap();
    }

    pub fn fail(&self, video_url: &str, detail: &str) {
        self.senders[video_url].send(Err(detail.to_string())).unwrap();
    }
}

/// Poll the registry until the task reports `status`.
pub async fn wait_for_status(
    registry: &TaskRegistry,
    task_id: Uuid,
    status: TaskStatus,
) -> TaskRecord {
    for _ in 0..500 {
        let task = registry.poll(task_id).await.unwrap();
        if task.status == status {
            return task;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("task {task_id} never reached {status}");
}

/// Submit a video to a live server.
pub async fn submit_video(
    client: &reqwest::Client,
    base_url: &str,
    video_url: &str,
) -> Result<serde_json::Value, Box<dyn std::error::Error + Send + Sync>> {
    let response = client
        .post(format!("{}/api/v1/tasks", base_url))
        .json(&serde_json::json!({ "video_url": video_url }))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await?;
        return Err(format!("Submission failed with status {}: {}", status, error_text).into());
    }
    Ok(response.json().await?)
}

/// Poll a live server until the task is completed or failed (with timeout).
pub async fn poll_task_status(
    client: &reqwest::Client,
    base_url: &str,
    task_id: &str,
    timeout_secs: u64,
) -> Result<TaskRecord, Box<dyn std::error::Error + Send + Sync>> {
    let max_attempts = timeout_secs * 2; // Poll every 500ms

    for attempt in 0..max_attempts {
        let response = client
            .get(format!("{}/api/v1/tasks/{}", base_url, task_id))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(format!("Status check failed: {}", error_text).into());
        }

        let task = response.json::<TaskRecord>().await?;
        if task.status.is_terminal() {
            return Ok(task);
        }
        if attempt % 10 == 0 && attempt > 0 {
            println!("  ... still waiting (attempt {}/{})", attempt, max_attempts);
        }
        sleep(Duration::from_millis(500)).await;
    }

    Err(format!("Task did not finish within {} seconds", timeout_secs).into())
}
