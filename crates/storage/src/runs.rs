//! Run record persistence: one file per task, overwritten in place

use drover_core::{RunRecord, TaskId};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur reading or writing run records
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Run records on disk, one JSON file per task id.
///
/// A record is the task's current truth, not a history: `save` replaces any
/// previous revision wholesale.
#[derive(Clone)]
pub struct RunStore {
    base: PathBuf,
}

impl RunStore {
    /// Open a store rooted at `base`, creating the directory if needed
    pub fn open(base: &Path) -> Result<Self, StorageError> {
        fs::create_dir_all(base)?;
        Ok(Self {
            base: base.to_path_buf(),
        })
    }

    /// Where a task's record lives
    pub fn path_for(&self, id: &TaskId) -> PathBuf {
        self.base.join(format!("{}.json", sanitize(&id.0)))
    }

    /// Write the record, replacing any previous revision
    pub fn save(&self, record: &RunRecord) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(record)?;
        fs::write(self.path_for(&record.task_id), json)?;
        Ok(())
    }

    /// Load one record, or None if the task has never run
    pub fn load(&self, id: &TaskId) -> Result<Option<RunRecord>, StorageError> {
        let data = match fs::read_to_string(self.path_for(id)) {
            Ok(d) => d,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&data)?))
    }

    /// All records, sorted by task id.
    ///
    /// Unreadable files are skipped with a warning so one corrupt record
    /// cannot hide the rest.
    pub fn list(&self) -> Result<Vec<RunRecord>, StorageError> {
        let entries = match fs::read_dir(&self.base) {
            Ok(e) => e,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records: Vec<RunRecord> = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let data = match fs::read_to_string(&path) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "skipping unreadable run record"
                    );
                    continue;
                }
            };
            match serde_json::from_str(&data) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "skipping corrupt run record"
                    );
                }
            }
        }

        records.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        Ok(records)
    }

    /// Remove a record; already absent is fine
    pub fn delete(&self, id: &TaskId) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Task ids come from external stores and may hold path separators or
/// other characters a filename cannot
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "runs_tests.rs"]
mod tests;
