//! Imports completed batch outputs into a browsable gallery directory.
//!
//! Layout: `<gallery>/<output_id>/...` holds a copy of each accepted output
//! and `<gallery>/index.json` lists them. Imports are appendable; an output
//! already listed in the index is skipped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::models::batch::{is_safe_output_id, Batch, BatchEntry};
use crate::models::task::TaskStatus;
use crate::services::storage::{self, StorageError};

pub const INDEX_FILE: &str = "index.json";
pub const DEFAULT_REQUIRED_ARTIFACT: &str = "report.json";

#[derive(Debug, thiserror::Error)]
pub enum GalleryError {
    #[error("Gallery storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Gallery path {0} is not a directory")]
    NotADirectory(PathBuf),
}

/// Criteria an output must meet before it is imported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityGates {
    /// File that must exist inside the output directory.
    pub required_artifact: String,
    /// Minimum length of the `claims` array in the required artifact.
    pub min_claims: Option<usize>,
    /// When set, only these categories are imported.
    pub categories: Option<Vec<String>>,
}

impl Default for QualityGates {
    fn default() -> Self {
        Self {
            required_artifact: DEFAULT_REQUIRED_ARTIFACT.to_string(),
            min_claims: None,
            categories: None,
        }
    }
}

/// One row of the gallery index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GalleryRecord {
    pub id: String,
    pub logical_id: String,
    pub video_url: String,
    pub category: Option<String>,
    pub label: Option<String>,
    pub imported_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GalleryIndex {
    pub records: Vec<GalleryRecord>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub imported: Vec<String>,
    pub skipped: Vec<String>,
    /// (logical id, reason)
    pub rejected: Vec<(String, String)>,
}

pub struct GalleryImporter {
    root: PathBuf,
    gates: QualityGates,
}

impl GalleryImporter {
    pub fn new(root: impl Into<PathBuf>, gates: QualityGates) -> Self {
        Self {
            root: root.into(),
            gates,
        }
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    /// Current index; empty when the gallery has not been written yet.
    pub fn load_index(&self) -> Result<GalleryIndex, GalleryError> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(GalleryIndex::default());
        }
        Ok(storage::read_json(&path)?)
    }

    /// Import every output of `batch` that passes the quality gates.
    ///
    /// If a copy fails, outputs already copied in this run are still indexed
    /// before the error is returned.
    pub fn import(&self, batch: &Batch) -> Result<ImportReport, GalleryError> {
        if self.root.exists() && !self.root.is_dir() {
            return Err(GalleryError::NotADirectory(self.root.clone()));
        }

        let mut index = self.load_index()?;
        let mut known: HashSet<String> = index.records.iter().map(|r| r.id.clone()).collect();
        let mut report = ImportReport::default();

        for entry in &batch.entries {
            let (output_id, source) = match self.check(entry) {
                Ok(accepted) => accepted,
                Err(reason) => {
                    report.rejected.push((entry.id.clone(), reason));
                    continue;
                }
            };

            if known.contains(&output_id) {
                report.skipped.push(entry.id.clone());
                continue;
            }

            let files = match storage::copy_dir(&source, &self.root.join(&output_id)) {
                Ok(files) => files,
                Err(e) => {
                    warn!(entry = %entry.id, output_id = %output_id, error = %e, "Gallery copy failed");
                    if !report.imported.is_empty() {
                        storage::write_json(&self.index_path(), &index)?;
                    }
                    return Err(e.into());
                }
            };
            info!(entry = %entry.id, output_id = %output_id, files, "Output imported into gallery");

            index.records.push(GalleryRecord {
                id: output_id.clone(),
                logical_id: entry.id.clone(),
                video_url: entry.video_url.clone(),
                category: entry.category.clone(),
                label: entry.label.clone(),
                imported_at: Utc::now(),
            });
            known.insert(output_id);
            report.imported.push(entry.id.clone());
        }

        if !report.imported.is_empty() {
            storage::write_json(&self.index_path(), &index)?;
        }
        Ok(report)
    }

    /// Returns the output id and directory to copy, or the rejection reason.
    fn check(&self, entry: &BatchEntry) -> Result<(String, PathBuf), String> {
        if entry.status != TaskStatus::Completed {
            return Err(format!("status is {}", entry.status));
        }
        if let Some(allowed) = &self.gates.categories {
            let category = entry.category.as_deref().unwrap_or_default();
            if !allowed.iter().any(|c| c == category) {
                return Err(format!("category '{}' not allowed", category));
            }
        }
        let output_id = entry
            .output_id
            .clone()
            .ok_or_else(|| "no output id".to_string())?;
        if !is_safe_output_id(&output_id) {
            return Err(format!("unsafe output id '{}'", output_id));
        }
        let location = entry
            .output_location
            .clone()
            .ok_or_else(|| "no output location".to_string())?;
        if !location.is_dir() {
            return Err(format!("output {} does not exist", location.display()));
        }

        let artifact = location.join(&self.gates.required_artifact);
        if !artifact.is_file() {
            return Err(format!("missing {}", self.gates.required_artifact));
        }
        if let Some(min) = self.gates.min_claims {
            let claims = count_claims(&artifact)?;
            if claims < min {
                return Err(format!("{} claims, need at least {}", claims, min));
            }
        }
        Ok((output_id, location))
    }
}

fn count_claims(artifact: &Path) -> Result<usize, String> {
    let report: serde_json::Value = storage::read_json(artifact).map_err(|e| {
        warn!(path = %artifact.display(), error = %e, "Unreadable report");
        format!("unreadable report: {}", e)
    })?;
    Ok(report
        .get("claims")
        .and_then(|c| c.as_array())
        .map_or(0, Vec::len))
}
