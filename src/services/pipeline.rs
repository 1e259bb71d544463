use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;

use crate::models::task::TaskConfig;

/// Environment variable carrying the task config (JSON) into the pipeline process.
pub const TASK_CONFIG_ENV: &str = "VERIFY_TASK_CONFIG";

/// Environment variable naming the directory the pipeline should write into.
pub const OUTPUT_ROOT_ENV: &str = "VERIFY_OUTPUT_ROOT";

/// Bytes of stderr kept in failure messages.
const STDERR_TAIL_BYTES: usize = 2000;

/// The claim extraction and verification pipeline, invoked as one opaque
/// blocking call per task.
pub trait VerificationPipeline: Send + Sync {
    fn run(&self, video_url: &str, config: &TaskConfig) -> Result<PipelineOutput, PipelineError>;
}

/// Result object returned by the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PipelineOutput {
    #[serde(default)]
    pub output_id: Option<String>,
    #[serde(default)]
    pub output_dir: Option<String>,
}

impl PipelineOutput {
    /// The output identifier, falling back to the last component of `output_dir`.
    pub fn resolve_output_id(&self) -> Option<String> {
        if let Some(id) = self.output_id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
            return Some(id.to_string());
        }
        self.output_dir
            .as_deref()
            .and_then(|dir| Path::new(dir).file_name())
            .map(|name| name.to_string_lossy().into_owned())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Failed to launch pipeline: {0}")]
    Launch(#[from] std::io::Error),

    #[error("Pipeline exited with status {status}: {stderr}")]
    Exit { status: i32, stderr: String },

    #[error("Failed to parse pipeline output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Pipeline failed: {0}")]
    Other(String),
}

/// Runs the pipeline as an external program.
///
/// The video URL is appended as the last argument and the task config is
/// passed as JSON in `VERIFY_TASK_CONFIG`. Stdout must be a JSON object with
/// `output_id` and/or `output_dir`.
pub struct CommandPipeline {
    program: String,
    args: Vec<String>,
    output_root: Option<String>,
}

impl CommandPipeline {
    pub fn new(program: impl Into<String>, args: Vec<String>, output_root: Option<String>) -> Self {
        Self {
            program: program.into(),
            args,
            output_root,
        }
    }
}

impl VerificationPipeline for CommandPipeline {
    fn run(&self, video_url: &str, config: &TaskConfig) -> Result<PipelineOutput, PipelineError> {
        let config_json = serde_json::to_string(config)?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(video_url)
            .env(TASK_CONFIG_ENV, config_json);
        if let Some(root) = &self.output_root {
            command.env(OUTPUT_ROOT_ENV, root);
        }

        tracing::debug!(program = %self.program, video_url = %video_url, "Invoking pipeline");
        let output = command.output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr: &str = &stderr;
            let start = stderr.len().saturating_sub(STDERR_TAIL_BYTES);
            let tail = stderr.get(start..).unwrap_or(stderr).trim().to_string();
            return Err(PipelineError::Exit {
                status: output.status.code().unwrap_or(-1),
                stderr: tail,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(serde_json::from_str(stdout.trim())?)
    }
}
