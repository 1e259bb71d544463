//! Polling loop that keeps a batch ledger in step with its task registry.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

use crate::models::batch::Batch;
use crate::models::task::TaskStatus;
use crate::services::batch_tracker::{BatchTracker, LedgerError, ReconcileReport};
use crate::services::source::StatusSource;

/// Snapshot of batch progress after a reconciliation cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchMetrics {
    pub counts: HashMap<TaskStatus, usize>,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// Entries still PENDING or PROCESSING.
    pub active: usize,
    /// Mean completed duration times the number of non-terminal entries.
    /// `None` until at least one entry has completed.
    pub eta: Option<Duration>,
    pub throughput_per_hour: f64,
    pub all_terminal: bool,
}

impl BatchMetrics {
    pub fn compute(batch: &Batch, now: DateTime<Utc>) -> Self {
        let mut counts: HashMap<TaskStatus, usize> =
            TaskStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for entry in &batch.entries {
            *counts.entry(entry.status).or_default() += 1;
        }

        let completed = counts[&TaskStatus::Completed];
        let failed = counts[&TaskStatus::Failed];
        let total = batch.entries.len();
        let active = total - completed - failed;

        let durations: Vec<f64> = batch
            .entries
            .iter()
            .filter(|e| e.status == TaskStatus::Completed)
            .filter_map(|e| e.processing_secs)
            .collect();
        let eta = if durations.is_empty() {
            None
        } else {
            let mean = durations.iter().sum::<f64>() / durations.len() as f64;
            Some(Duration::from_secs_f64((mean * active as f64).max(0.0)))
        };

        let elapsed_hours = (now - batch.created_at).num_milliseconds() as f64 / 3_600_000.0;
        let throughput_per_hour = if elapsed_hours > 0.0 {
            completed as f64 / elapsed_hours
        } else {
            0.0
        };

        Self {
            counts,
            total,
            completed,
            failed,
            active,
            eta,
            throughput_per_hour,
            all_terminal: active == 0,
        }
    }

    /// Publish the snapshot as gauges.
    pub fn record(&self) {
        for (status, count) in &self.counts {
            metrics::gauge!("batch_entries", "status" => status.to_string()).set(*count as f64);
        }
        if let Some(eta) = self.eta {
            metrics::gauge!("batch_eta_seconds").set(eta.as_secs_f64());
        }
    }
}

/// Result of one monitor cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub reconcile: ReconcileReport,
    pub metrics: BatchMetrics,
}

/// Why the continuous loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// Every entry reached a terminal status.
    Finished,
    /// The iteration cap was reached with entries still active.
    IterationLimit,
    /// The stop flag was raised between cycles.
    Stopped,
}

pub struct BatchMonitor<S> {
    source: S,
    interval: Duration,
    stop: Option<watch::Receiver<bool>>,
}

impl<S: StatusSource> BatchMonitor<S> {
    pub fn new(source: S, interval: Duration) -> Self {
        Self {
            source,
            interval,
            stop: None,
        }
    }

    /// Stop the continuous loop once `stop` carries `true`.
    pub fn with_stop(mut self, stop: watch::Receiver<bool>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Reconcile once and report.
    pub async fn run_once(&self, tracker: &mut BatchTracker) -> Result<CycleReport, LedgerError> {
        let reconcile = tracker.reconcile(&self.source).await?;
        let metrics = BatchMetrics::compute(tracker.batch(), Utc::now());
        metrics.record();

        info!(
            batch_id = %tracker.batch().batch_id,
            completed = metrics.completed,
            failed = metrics.failed,
            active = metrics.active,
            changed = reconcile.transitions.len(),
            lookup_errors = reconcile.lookup_errors.len(),
            eta_secs = metrics.eta.map(|d| d.as_secs()),
            "Batch reconciled"
        );
        Ok(CycleReport { reconcile, metrics })
    }

    /// Reconcile until every entry is terminal, `max_iterations` cycles have
    /// run, or the stop flag is raised. Lookup failures never end the loop;
    /// ledger write failures do.
    pub async fn run(
        &self,
        tracker: &mut BatchTracker,
        max_iterations: Option<u32>,
    ) -> Result<(MonitorOutcome, CycleReport), LedgerError> {
        let mut stop = self.stop.clone();
        let mut iteration: u32 = 0;

        loop {
            iteration += 1;
            let report = self.run_once(tracker).await?;

            if report.metrics.all_terminal {
                info!(batch_id = %tracker.batch().batch_id, iterations = iteration, "Batch finished");
                return Ok((MonitorOutcome::Finished, report));
            }
            if max_iterations.is_some_and(|max| iteration >= max) {
                info!(iterations = iteration, "Monitor iteration limit reached");
                return Ok((MonitorOutcome::IterationLimit, report));
            }

            match stop.as_mut() {
                Some(rx) => {
                    if *rx.borrow() {
                        return Ok((MonitorOutcome::Stopped, report));
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(self.interval) => {}
                        changed = rx.changed() => {
                            // A dropped sender can no longer stop us; finish the sleep.
                            if changed.is_err() {
                                tokio::time::sleep(self.interval).await;
                            }
                        }
                    }
                    if *rx.borrow() {
                        info!("Monitor stopped");
                        return Ok((MonitorOutcome::Stopped, report));
                    }
                }
                None => tokio::time::sleep(self.interval).await,
            }
        }
    }
}
