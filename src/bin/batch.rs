use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use video_claim_verify::{
    config::{BatchConfig, BatchMode},
    models::{batch::BatchInput, task::TaskConfig},
    services::{
        batch_tracker::{submitted_before, BatchTracker},
        gallery::{GalleryImporter, QualityGates},
        monitor::{BatchMonitor, MonitorOutcome},
        remote::RemoteRegistry,
        storage,
    },
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting batch runner");

    // Load configuration
    let config = BatchConfig::from_env().expect("Failed to load configuration");

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Batch run failed");
        std::process::exit(1);
    }
}

async fn run(config: BatchConfig) -> Result<(), Box<dyn std::error::Error>> {
    let remote = RemoteRegistry::new(&config.api_base_url)?;

    let mut tracker = if config.batch_ledger.exists() {
        BatchTracker::load(&config.batch_ledger)?
    } else {
        let inputs_path = config
            .batch_inputs
            .as_ref()
            .ok_or("BATCH_INPUTS is required to create a new ledger")?;
        let inputs: Vec<BatchInput> = storage::read_json(inputs_path)?;
        BatchTracker::create(
            &config.batch_ledger,
            config.batch_id.clone(),
            inputs,
            remote.base_url(),
            config.output_root.clone(),
        )?
    };

    let task_config = TaskConfig::default();
    let submitted = tracker.submit_pending(&remote, &task_config).await?;
    if !submitted.submitted.is_empty() || !submitted.rejected.is_empty() {
        tracing::info!(
            submitted = submitted.submitted.len(),
            rejected = submitted.rejected.len(),
            "Pending entries submitted"
        );
    }
    if !submitted.deferred.is_empty() {
        tracing::warn!(
            deferred = submitted.deferred.len(),
            "Registry unreachable; entries stay pending until the next run"
        );
    }

    if config.resubmit_failed {
        let ids = match config.stuck_after_secs {
            Some(secs) => tracker.select_for_resubmission(submitted_before(
                Duration::from_secs(secs),
                chrono::Utc::now(),
            )),
            None => tracker.select_for_resubmission(|_| false),
        };
        if !ids.is_empty() {
            let report = tracker.resubmit_with(&ids, &remote, &task_config).await?;
            tracing::info!(
                resubmitted = report.submitted.len(),
                rejected = report.rejected.len(),
                "Failed and stuck entries resubmitted"
            );
        }
    }

    let monitor = BatchMonitor::new(remote, config.poll_interval());
    match config.batch_mode {
        BatchMode::Once => {
            monitor.run_once(&mut tracker).await?;
        }
        BatchMode::Watch => {
            let (stop_tx, stop_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Interrupt received, stopping after this cycle");
                    let _ = stop_tx.send(true);
                }
            });
            let monitor = monitor.with_stop(stop_rx);
            let (outcome, _) = monitor.run(&mut tracker, config.max_iterations).await?;
            if outcome != MonitorOutcome::Finished {
                tracing::info!(outcome = ?outcome, "Monitor exited before batch finished");
            }
        }
    }

    let summary = tracker.summary();
    tracing::info!(
        batch_id = %tracker.batch().batch_id,
        total = summary.total,
        completed = summary.completed,
        failed = summary.failed,
        pending = summary.pending,
        processing = summary.processing,
        "Batch summary"
    );
    for (id, error) in &summary.failures {
        tracing::warn!(entry = %id, error = %error, "Entry failed");
    }

    if let Some(gallery_dir) = &config.gallery_dir {
        let gates = QualityGates {
            min_claims: config.gallery_min_claims,
            ..QualityGates::default()
        };
        let report = GalleryImporter::new(gallery_dir, gates).import(tracker.batch())?;
        tracing::info!(
            imported = report.imported.len(),
            skipped = report.skipped.len(),
            rejected = report.rejected.len(),
            "Gallery import finished"
        );
    }

    Ok(())
}
