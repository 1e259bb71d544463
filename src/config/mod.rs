use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Settings for the task registry server.
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Program that runs the verification pipeline for one video.
    pub pipeline_command: String,

    /// Extra arguments placed before the video URL, comma separated.
    #[serde(default)]
    pub pipeline_args: Vec<String>,

    /// Directory the pipeline writes its outputs into.
    pub output_root: Option<String>,

    /// Upper bound on concurrently running pipeline invocations.
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_max_concurrent_tasks() -> usize {
    4
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}

/// How the batch runner drives reconciliation.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BatchMode {
    /// Reconcile once and report.
    #[default]
    Once,
    /// Reconcile until every entry is terminal.
    Watch,
}

/// Settings for the batch runner.
#[derive(Debug, Deserialize)]
pub struct BatchConfig {
    /// Ledger file; created from `batch_inputs` when missing.
    pub batch_ledger: PathBuf,

    /// JSON list of batch inputs, needed only to create a new ledger.
    pub batch_inputs: Option<PathBuf>,

    /// Identifier for a newly created batch.
    pub batch_id: Option<String>,

    /// Base URL of the task registry API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Where completed outputs live, recorded in a new ledger.
    pub output_root: Option<PathBuf>,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Cap on watch-mode cycles.
    pub max_iterations: Option<u32>,

    /// Active entries submitted longer ago than this are treated as stuck.
    pub stuck_after_secs: Option<u64>,

    /// Resubmit failed (and stuck) entries before monitoring.
    #[serde(default)]
    pub resubmit_failed: bool,

    /// Import completed outputs here once the batch is done.
    pub gallery_dir: Option<PathBuf>,

    /// Minimum number of claims in an output's report for gallery import.
    pub gallery_min_claims: Option<usize>,

    #[serde(default)]
    pub batch_mode: BatchMode,
}

fn default_api_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_poll_interval_secs() -> u64 {
    30
}

impl BatchConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}
