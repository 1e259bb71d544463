//! File-backed batch ledger.
//!
//! A `BatchTracker` owns one ledger file. Every mutating operation takes
//! `&mut self`, so a tracker has a single reconciliation owner at a time; share
//! it across tasks behind a `tokio::sync::Mutex` if needed. The whole ledger is
//! rewritten atomically on every persisted change.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::batch::{Batch, BatchEntry, BatchInput};
use crate::models::task::{TaskConfig, TaskStatus};
use crate::services::source::{StatusSource, SubmitError, TaskSubmitter};
use crate::services::storage::{self, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Ledger storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Ledger already exists at {0}")]
    AlreadyExists(PathBuf),

    #[error("Duplicate logical id in batch input: {0}")]
    DuplicateId(String),

    #[error("Unknown batch entry: {0}")]
    UnknownEntry(String),

    #[error("Entry {id} still has active task {task_id}")]
    ActiveTask { id: String, task_id: Uuid },
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub checked: usize,
    /// (logical id, previous status, new status)
    pub transitions: Vec<(String, TaskStatus, TaskStatus)>,
    /// (logical id, lookup error) for entries that could not be refreshed.
    pub lookup_errors: Vec<(String, String)>,
    pub persisted: bool,
}

/// Outcome of submitting entries to a registry.
#[derive(Debug, Clone, Default)]
pub struct SubmissionReport {
    pub submitted: Vec<(String, Uuid)>,
    pub rejected: Vec<(String, String)>,
    /// Entries left PENDING because the registry could not be reached.
    pub deferred: Vec<(String, String)>,
}

/// Per-status counts plus failure details.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    /// (logical id, error detail)
    pub failures: Vec<(String, String)>,
}

pub struct BatchTracker {
    path: PathBuf,
    batch: Batch,
    /// In-memory changes not yet on disk.
    dirty: bool,
}

impl BatchTracker {
    /// Create a new ledger with every input PENDING and no task attached,
    /// and persist it immediately.
    pub fn create(
        path: impl Into<PathBuf>,
        batch_id: Option<String>,
        inputs: Vec<BatchInput>,
        endpoint: impl Into<String>,
        output_root: Option<PathBuf>,
    ) -> Result<Self, LedgerError> {
        let path = path.into();
        if path.exists() {
            return Err(LedgerError::AlreadyExists(path));
        }

        let mut entries: Vec<BatchEntry> = Vec::with_capacity(inputs.len());
        for input in inputs {
            if entries.iter().any(|e| e.id == input.id) {
                return Err(LedgerError::DuplicateId(input.id));
            }
            entries.push(BatchEntry::from_input(input));
        }

        let created_at = Utc::now();
        let batch = Batch {
            batch_id: batch_id
                .unwrap_or_else(|| format!("batch_{}", created_at.format("%Y%m%d_%H%M%S"))),
            created_at,
            last_reconciled_at: None,
            endpoint: endpoint.into(),
            output_root,
            entries,
        };

        let mut tracker = Self {
            path,
            batch,
            dirty: true,
        };
        tracker.persist()?;
        info!(
            batch_id = %tracker.batch.batch_id,
            entries = tracker.batch.entries.len(),
            path = %tracker.path.display(),
            "Batch ledger created"
        );
        Ok(tracker)
    }

    /// Re-hydrate a persisted ledger. A temp file left by an interrupted
    /// write is discarded; the last complete ledger is authoritative.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        if storage::discard_stale_temp(&path) {
            warn!(path = %path.display(), "Discarded partially written ledger update");
        }
        let batch: Batch = storage::read_json(&path)?;
        info!(
            batch_id = %batch.batch_id,
            entries = batch.entries.len(),
            "Batch ledger loaded"
        );
        Ok(Self {
            path,
            batch,
            dirty: false,
        })
    }

    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True while some in-memory change has not reached the ledger file.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Rewrite the ledger file. On failure the tracker stays dirty and the
    /// next reconcile retries the write.
    pub fn persist(&mut self) -> Result<(), LedgerError> {
        self.dirty = true;
        storage::write_json(&self.path, &self.batch)?;
        self.dirty = false;
        Ok(())
    }

    /// Submit every entry that has never been given a task.
    ///
    /// The ledger is persisted after each accepted submission so a crash
    /// never loses a task id. Rejected submissions mark the entry FAILED;
    /// transport failures leave it PENDING for the next run.
    pub async fn submit_pending<S>(
        &mut self,
        submitter: &S,
        config: &TaskConfig,
    ) -> Result<SubmissionReport, LedgerError>
    where
        S: TaskSubmitter + ?Sized,
    {
        let mut report = SubmissionReport::default();
        let pending: Vec<usize> = self
            .batch
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.task_id.is_none() && e.status == TaskStatus::Pending)
            .map(|(i, _)| i)
            .collect();

        for idx in pending {
            let video_url = self.batch.entries[idx].video_url.clone();
            let result = submitter.submit(&video_url, config).await;
            let entry = &mut self.batch.entries[idx];
            match result {
                Ok(accepted) => {
                    entry.attach_task(accepted.task_id, accepted.status, Utc::now());
                    info!(entry = %entry.id, task_id = %accepted.task_id, "Entry submitted");
                    report.submitted.push((entry.id.clone(), accepted.task_id));
                }
                Err(e @ SubmitError::Http(_)) => {
                    warn!(entry = %entry.id, error = %e, "Registry unreachable, entry left pending");
                    report.deferred.push((entry.id.clone(), e.to_string()));
                    continue;
                }
                Err(e) => {
                    warn!(entry = %entry.id, error = %e, "Submission rejected");
                    entry.status = TaskStatus::Failed;
                    entry.message = "Submission rejected".to_string();
                    entry.error = Some(e.to_string());
                    report.rejected.push((entry.id.clone(), e.to_string()));
                }
            }
            self.persist()?;
        }
        Ok(report)
    }

    /// Refresh mirrored fields of every active entry from `source`.
    ///
    /// Terminal entries are left alone. Lookup failures are isolated to their
    /// entry and reported. The ledger is rewritten only when some entry's
    /// mirrored status changed, or when an earlier write failed.
    pub async fn reconcile<S>(&mut self, source: &S) -> Result<ReconcileReport, LedgerError>
    where
        S: StatusSource + ?Sized,
    {
        let mut report = ReconcileReport::default();
        let output_root = self.batch.output_root.clone();

        for entry in self.batch.entries.iter_mut() {
            let Some(task_id) = entry.task_id.filter(|_| !entry.status.is_terminal()) else {
                continue;
            };
            report.checked += 1;

            match source.lookup(task_id).await {
                Ok(task) => {
                    let before = entry.status;
                    if entry.mirror(&task, output_root.as_deref()) {
                        info!(
                            entry = %entry.id,
                            task_id = %task_id,
                            from = %before,
                            to = %entry.status,
                            "Entry status changed"
                        );
                        report.transitions.push((entry.id.clone(), before, entry.status));
                    }
                }
                Err(e) => {
                    warn!(entry = %entry.id, task_id = %task_id, error = %e, "Status lookup failed");
                    report.lookup_errors.push((entry.id.clone(), e.to_string()));
                }
            }
        }

        if !report.transitions.is_empty() {
            self.batch.last_reconciled_at = Some(Utc::now());
            self.dirty = true;
        }
        if self.dirty {
            self.persist()?;
            report.persisted = true;
        }
        Ok(report)
    }

    /// Logical ids that should be re-submitted: every FAILED entry, plus
    /// active entries for which `is_stuck` holds.
    pub fn select_for_resubmission<F>(&self, is_stuck: F) -> Vec<String>
    where
        F: Fn(&BatchEntry) -> bool,
    {
        self.batch
            .entries
            .iter()
            .filter(|e| e.status == TaskStatus::Failed || (e.is_active() && is_stuck(e)))
            .map(|e| e.id.clone())
            .collect()
    }

    /// Replace the entry's task with `new_task_id`.
    ///
    /// Without `force`, the previous task must already be terminal. The entry
    /// is reset to PROCESSING with terminal fields cleared, then persisted.
    pub fn resubmit(
        &mut self,
        logical_id: &str,
        new_task_id: Uuid,
        force: bool,
    ) -> Result<(), LedgerError> {
        let entry = self
            .batch
            .entry_mut(logical_id)
            .ok_or_else(|| LedgerError::UnknownEntry(logical_id.to_string()))?;

        if let Some(task_id) = entry.task_id {
            if !force && !entry.status.is_terminal() {
                return Err(LedgerError::ActiveTask {
                    id: logical_id.to_string(),
                    task_id,
                });
            }
        }

        let previous = entry.task_id;
        entry.replace_task(new_task_id, Utc::now());
        info!(
            entry = %logical_id,
            previous_task = ?previous,
            task_id = %new_task_id,
            forced = force,
            "Entry resubmitted"
        );
        self.persist()
    }

    /// Submit fresh tasks for `ids` and point their entries at them.
    ///
    /// Stuck entries are superseded. Submission failures are recorded on the
    /// entry and reported; persistence failures abort.
    pub async fn resubmit_with<S>(
        &mut self,
        ids: &[String],
        submitter: &S,
        config: &TaskConfig,
    ) -> Result<SubmissionReport, LedgerError>
    where
        S: TaskSubmitter + ?Sized,
    {
        let mut report = SubmissionReport::default();
        for id in ids {
            let video_url = self
                .batch
                .entry(id)
                .map(|e| e.video_url.clone())
                .ok_or_else(|| LedgerError::UnknownEntry(id.clone()))?;

            match submitter.submit(&video_url, config).await {
                Ok(accepted) => {
                    self.resubmit(id, accepted.task_id, true)?;
                    report.submitted.push((id.clone(), accepted.task_id));
                }
                Err(e) => {
                    warn!(entry = %id, error = %e, "Resubmission rejected");
                    if let Some(entry) = self.batch.entry_mut(id) {
                        entry.error = Some(e.to_string());
                    }
                    self.persist()?;
                    report.rejected.push((id.clone(), e.to_string()));
                }
            }
        }
        Ok(report)
    }

    pub fn summary(&self) -> BatchSummary {
        let entries = &self.batch.entries;
        BatchSummary {
            total: entries.len(),
            pending: self.batch.count(TaskStatus::Pending),
            processing: self.batch.count(TaskStatus::Processing),
            completed: self.batch.count(TaskStatus::Completed),
            failed: self.batch.count(TaskStatus::Failed),
            failures: entries
                .iter()
                .filter(|e| e.status == TaskStatus::Failed)
                .map(|e| {
                    (
                        e.id.clone(),
                        e.error.clone().unwrap_or_else(|| e.message.clone()),
                    )
                })
                .collect(),
        }
    }
}

/// Stuck-entry predicate: active and submitted longer than `threshold` before `now`.
pub fn submitted_before(threshold: Duration, now: DateTime<Utc>) -> impl Fn(&BatchEntry) -> bool {
    let threshold = chrono::Duration::from_std(threshold).unwrap_or(chrono::Duration::MAX);
    move |entry: &BatchEntry| {
        entry
            .submitted_at
            .map(|at| now.signed_duration_since(at) > threshold)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::TaskRecord;
    use crate::models::verification::SubmitTaskResponse;
    use crate::services::source::LookupError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted registry: records live in a map the test edits directly.
    #[derive(Default)]
    struct FakeRegistry {
        tasks: Mutex<HashMap<Uuid, TaskRecord>>,
        unreachable: Mutex<Vec<Uuid>>,
        lookups: Mutex<usize>,
        offline: Mutex<bool>,
    }

    impl FakeRegistry {
        fn set(&self, task_id: Uuid, status: TaskStatus, output_id: Option<&str>, error: Option<&str>) {
            let mut tasks = self.tasks.lock().unwrap();
            let task = tasks.get_mut(&task_id).unwrap();
            task.status = status;
            task.output_id = output_id.map(str::to_string);
            task.error = error.map(str::to_string);
            task.updated_at = task.created_at + chrono::Duration::seconds(120);
        }
    }

    #[async_trait]
    impl StatusSource for FakeRegistry {
        async fn lookup(&self, task_id: Uuid) -> Result<TaskRecord, LookupError> {
            *self.lookups.lock().unwrap() += 1;
            if self.unreachable.lock().unwrap().contains(&task_id) {
                return Err(LookupError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            self.tasks
                .lock()
                .unwrap()
                .get(&task_id)
                .cloned()
                .ok_or(LookupError::NotFound(task_id))
        }
    }

    #[async_trait]
    impl TaskSubmitter for FakeRegistry {
        async fn submit(
            &self,
            video_url: &str,
            config: &TaskConfig,
        ) -> Result<SubmitTaskResponse, SubmitError> {
            if *self.offline.lock().unwrap() {
                let err = reqwest::Client::new().get("not a url").build().unwrap_err();
                return Err(SubmitError::Http(err));
            }
            if !video_url.starts_with("https://") {
                return Err(SubmitError::Invalid("bad url".to_string()));
            }
            let task = TaskRecord::new(video_url, config.clone());
            let response = SubmitTaskResponse {
                task_id: task.task_id,
                status: task.status,
                message: task.message.clone(),
            };
            self.tasks.lock().unwrap().insert(task.task_id, task);
            Ok(response)
        }
    }

    fn inputs(n: usize) -> Vec<BatchInput> {
        (1..=n)
            .map(|i| BatchInput {
                id: format!("test_{i:02}"),
                video_url: format!("https://example.com/v/{i}"),
                category: Some("health".to_string()),
                label: Some("needs_review".to_string()),
                metadata: Default::default(),
            })
            .collect()
    }

    fn new_tracker(dir: &Path, n: usize) -> BatchTracker {
        BatchTracker::create(
            dir.join("batch.json"),
            Some("batch_test".to_string()),
            inputs(n),
            "http://localhost:3000",
            Some(PathBuf::from("/outputs")),
        )
        .unwrap()
    }

    fn task_id(tracker: &BatchTracker, id: &str) -> Uuid {
        tracker.batch().entry(id).unwrap().task_id.unwrap()
    }

    #[test]
    fn test_create_persists_pending_entries() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = new_tracker(dir.path(), 3);

        let loaded = BatchTracker::load(dir.path().join("batch.json")).unwrap();
        assert_eq!(loaded.batch(), tracker.batch());
        assert!(loaded
            .batch()
            .entries
            .iter()
            .all(|e| e.status == TaskStatus::Pending && e.task_id.is_none()));
    }

    #[test]
    fn test_create_rejects_duplicates_and_existing_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let mut dup = inputs(2);
        dup[1].id = dup[0].id.clone();
        let err = BatchTracker::create(dir.path().join("dup.json"), None, dup, "x", None);
        assert!(matches!(err, Err(LedgerError::DuplicateId(_))));

        new_tracker(dir.path(), 1);
        let err = BatchTracker::create(dir.path().join("batch.json"), None, inputs(1), "x", None);
        assert!(matches!(err, Err(LedgerError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_submit_pending_records_task_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = new_tracker(dir.path(), 2);
        tracker.batch.entries[1].video_url = "ftp://nope".to_string();
        let registry = FakeRegistry::default();

        let report = tracker.submit_pending(&registry, &TaskConfig::default()).await.unwrap();
        assert_eq!(report.submitted.len(), 1);
        assert_eq!(report.rejected.len(), 1);

        let loaded = BatchTracker::load(tracker.path()).unwrap();
        let ok = loaded.batch().entry("test_01").unwrap();
        assert!(ok.task_id.is_some());
        assert!(ok.submitted_at.is_some());
        let rejected = loaded.batch().entry("test_02").unwrap();
        assert_eq!(rejected.status, TaskStatus::Failed);
        assert!(rejected.error.as_deref().unwrap().contains("bad url"));

        // Nothing left to submit.
        let again = tracker.submit_pending(&registry, &TaskConfig::default()).await.unwrap();
        assert!(again.submitted.is_empty() && again.rejected.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_registry_leaves_entries_pending() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = new_tracker(dir.path(), 2);
        let registry = FakeRegistry::default();
        *registry.offline.lock().unwrap() = true;

        let report = tracker.submit_pending(&registry, &TaskConfig::default()).await.unwrap();
        assert!(report.submitted.is_empty() && report.rejected.is_empty());
        assert_eq!(report.deferred.len(), 2);
        let loaded = BatchTracker::load(tracker.path()).unwrap();
        assert!(loaded
            .batch()
            .entries
            .iter()
            .all(|e| e.status == TaskStatus::Pending && e.task_id.is_none() && e.error.is_none()));

        *registry.offline.lock().unwrap() = false;
        let retry = tracker.submit_pending(&registry, &TaskConfig::default()).await.unwrap();
        assert_eq!(retry.submitted.len(), 2);
    }

    #[tokio::test]
    async fn test_reconcile_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = new_tracker(dir.path(), 2);
        let registry = FakeRegistry::default();
        tracker.submit_pending(&registry, &TaskConfig::default()).await.unwrap();

        let first_id = task_id(&tracker, "test_01");
        registry.set(first_id, TaskStatus::Completed, Some("out_1"), None);

        let first = tracker.reconcile(&registry).await.unwrap();
        assert!(first.persisted);
        assert_eq!(first.transitions.len(), 1);
        let after_first = std::fs::read(tracker.path()).unwrap();

        let second = tracker.reconcile(&registry).await.unwrap();
        assert!(!second.persisted);
        assert!(second.transitions.is_empty());
        assert_eq!(std::fs::read(tracker.path()).unwrap(), after_first);

        let entry = tracker.batch().entry("test_01").unwrap();
        assert_eq!(entry.output_location, Some(PathBuf::from("/outputs/out_1")));
        assert_eq!(entry.processing_secs, Some(120.0));
    }

    #[tokio::test]
    async fn test_reconcile_isolates_lookup_failures() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = new_tracker(dir.path(), 3);
        let registry = FakeRegistry::default();
        tracker.submit_pending(&registry, &TaskConfig::default()).await.unwrap();

        let broken = task_id(&tracker, "test_01");
        registry.unreachable.lock().unwrap().push(broken);
        registry.set(task_id(&tracker, "test_02"), TaskStatus::Failed, None, Some("no audio track"));
        registry.set(task_id(&tracker, "test_03"), TaskStatus::Completed, Some("out_3"), None);

        let report = tracker.reconcile(&registry).await.unwrap();
        assert_eq!(report.checked, 3);
        assert_eq!(report.lookup_errors.len(), 1);
        assert_eq!(report.transitions.len(), 2);

        let summary = tracker.summary();
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.failures, vec![("test_02".to_string(), "no audio track".to_string())]);
        assert_eq!(tracker.batch().entry("test_01").unwrap().status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_terminal_entries_are_not_looked_up() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = new_tracker(dir.path(), 1);
        let registry = FakeRegistry::default();
        tracker.submit_pending(&registry, &TaskConfig::default()).await.unwrap();
        let id = task_id(&tracker, "test_01");
        registry.set(id, TaskStatus::Failed, None, Some("boom"));
        tracker.reconcile(&registry).await.unwrap();
        let lookups = *registry.lookups.lock().unwrap();

        registry.set(id, TaskStatus::Completed, Some("late"), None);
        let report = tracker.reconcile(&registry).await.unwrap();
        assert_eq!(report.checked, 0);
        assert_eq!(*registry.lookups.lock().unwrap(), lookups);
        assert_eq!(tracker.batch().entry("test_01").unwrap().status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn test_resubmit_replaces_task() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = new_tracker(dir.path(), 2);
        let registry = FakeRegistry::default();
        tracker.submit_pending(&registry, &TaskConfig::default()).await.unwrap();
        let old = task_id(&tracker, "test_01");
        registry.set(old, TaskStatus::Failed, None, Some("timeout"));
        tracker.reconcile(&registry).await.unwrap();

        let selected = tracker.select_for_resubmission(|_| false);
        assert_eq!(selected, vec!["test_01".to_string()]);

        let new_id = Uuid::new_v4();
        tracker.resubmit("test_01", new_id, false).unwrap();

        let loaded = BatchTracker::load(tracker.path()).unwrap();
        let entry = loaded.batch().entry("test_01").unwrap();
        assert_eq!(entry.task_id, Some(new_id));
        assert_eq!(entry.previous_task_ids, vec![old]);
        assert_eq!(entry.status, TaskStatus::Processing);
        assert!(entry.error.is_none());
        assert!(entry.completed_at.is_none());
        assert!(entry.output_location.is_none());
    }

    #[tokio::test]
    async fn test_resubmit_active_requires_force() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = new_tracker(dir.path(), 1);
        let registry = FakeRegistry::default();
        tracker.submit_pending(&registry, &TaskConfig::default()).await.unwrap();

        let err = tracker.resubmit("test_01", Uuid::new_v4(), false).unwrap_err();
        assert!(matches!(err, LedgerError::ActiveTask { .. }));
        assert!(matches!(
            tracker.resubmit("missing", Uuid::new_v4(), true),
            Err(LedgerError::UnknownEntry(_))
        ));

        let later = Utc::now() + chrono::Duration::hours(3);
        let stuck = tracker.select_for_resubmission(submitted_before(Duration::from_secs(3600), later));
        assert_eq!(stuck, vec!["test_01".to_string()]);
        let not_stuck = tracker.select_for_resubmission(submitted_before(Duration::from_secs(3600), Utc::now()));
        assert!(not_stuck.is_empty());

        let report = tracker
            .resubmit_with(&stuck, &registry, &TaskConfig::default())
            .await
            .unwrap();
        assert_eq!(report.submitted.len(), 1);
        let entry = tracker.batch().entry("test_01").unwrap();
        assert_eq!(entry.task_id, Some(report.submitted[0].1));
        assert_eq!(entry.previous_task_ids.len(), 1);
    }

    #[test]
    fn test_load_ignores_interrupted_write() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = new_tracker(dir.path(), 2);
        std::fs::write(storage::temp_path(tracker.path()), b"{\"batch_id\": \"half").unwrap();

        let loaded = BatchTracker::load(tracker.path()).unwrap();
        assert_eq!(loaded.batch(), tracker.batch());
        assert!(!storage::temp_path(tracker.path()).exists());
    }

    #[tokio::test]
    async fn test_reconcile_retries_failed_write() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = new_tracker(dir.path(), 1);
        let registry = FakeRegistry::default();
        tracker.submit_pending(&registry, &TaskConfig::default()).await.unwrap();
        let id = task_id(&tracker, "test_01");
        registry.set(id, TaskStatus::Completed, Some("out_1"), None);

        let ledger = tracker.path.clone();
        tracker.path = ledger.join("not-a-dir");
        assert!(matches!(
            tracker.reconcile(&registry).await,
            Err(LedgerError::Storage(_))
        ));
        assert!(tracker.is_dirty());
        assert_eq!(
            BatchTracker::load(&ledger).unwrap().batch().entry("test_01").unwrap().status,
            TaskStatus::Pending
        );

        tracker.path = ledger.clone();
        let report = tracker.reconcile(&registry).await.unwrap();
        assert!(report.transitions.is_empty());
        assert!(report.persisted);
        assert!(!tracker.is_dirty());

        let loaded = BatchTracker::load(&ledger).unwrap();
        let entry = loaded.batch().entry("test_01").unwrap();
        assert_eq!(entry.status, TaskStatus::Completed);
        assert_eq!(entry.output_location, Some(PathBuf::from("/outputs/out_1")));
        assert_eq!(loaded.batch(), tracker.batch());

        // Once on disk, reconcile is a no-op again.
        assert!(!tracker.reconcile(&registry).await.unwrap().persisted);
    }

    #[tokio::test]
    async fn test_queued_replacement_task_does_not_rewind_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = new_tracker(dir.path(), 1);
        let registry = FakeRegistry::default();
        tracker.submit_pending(&registry, &TaskConfig::default()).await.unwrap();

        let replacement = registry
            .submit("https://example.com/v/1", &TaskConfig::default())
            .await
            .unwrap();
        tracker.resubmit("test_01", replacement.task_id, true).unwrap();
        let before = std::fs::read(tracker.path()).unwrap();

        let report = tracker.reconcile(&registry).await.unwrap();
        assert!(report.transitions.is_empty());
        assert!(!report.persisted);
        assert_eq!(tracker.batch().entry("test_01").unwrap().status, TaskStatus::Processing);
        assert_eq!(std::fs::read(tracker.path()).unwrap(), before);
    }

    #[test]
    fn test_persist_error_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = new_tracker(dir.path(), 1);
        tracker.path = dir.path().join("batch.json").join("not-a-dir");
        tracker.batch.entries[0].status = TaskStatus::Failed;
        assert!(matches!(
            tracker.resubmit("test_01", Uuid::new_v4(), false),
            Err(LedgerError::Storage(_))
        ));
    }
}
