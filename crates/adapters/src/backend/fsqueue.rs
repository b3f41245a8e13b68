// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem-queue backend: task state is the directory a file lives in.
//!
//! `pending/` holds ready tasks, `claimed/` running ones, `done/` finished
//! ones. Claiming renames the file, which is atomic within one filesystem:
//! of two racing claimants exactly one rename succeeds, and the loser sees
//! the source file gone. Errors live in `errors/<id>.txt` sidecars and
//! progress notices append to `notes/<id>.log`.

use async_trait::async_trait;
use drover_core::{Task, TaskId};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use super::{BackendError, TaskBackend};

const TASK_EXT: &str = "md";

/// Split a task file into title and body. The title is the first non-empty
/// line, minus markdown heading markers.
fn parse_task_file(content: &str) -> (String, String) {
    let mut lines = content.lines();
    let title = loop {
        match lines.next() {
            Some(line) if line.trim().is_empty() => continue,
            Some(line) => break line.trim_start_matches('#').trim().to_string(),
            None => break String::new(),
        }
    };
    let body = lines.collect::<Vec<_>>().join("\n").trim().to_string();
    (title, body)
}

#[derive(Clone)]
pub struct FsQueueBackend {
    root: PathBuf,
}

impl FsQueueBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn pending(&self, id: &TaskId) -> PathBuf {
        self.root.join("pending").join(format!("{id}.{TASK_EXT}"))
    }

    fn claimed(&self, id: &TaskId) -> PathBuf {
        self.root.join("claimed").join(format!("{id}.{TASK_EXT}"))
    }

    fn done(&self, id: &TaskId) -> PathBuf {
        self.root.join("done").join(format!("{id}.{TASK_EXT}"))
    }

    fn error_file(&self, id: &TaskId) -> PathBuf {
        self.root.join("errors").join(format!("{id}.txt"))
    }

    fn note_file(&self, id: &TaskId) -> PathBuf {
        self.root.join("notes").join(format!("{id}.log"))
    }
}

#[async_trait]
impl TaskBackend for FsQueueBackend {
    async fn list_ready_tasks(&self) -> Result<Vec<TaskId>, BackendError> {
        let dir = self.root.join("pending");
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == TASK_EXT) {
                if let Some(stem) = path.file_stem() {
                    ids.push(TaskId(stem.to_string_lossy().into_owned()));
                }
            }
        }
        // Directory order is arbitrary; dispatch order should not be
        ids.sort();
        Ok(ids)
    }

    async fn claim_task(&self, id: &TaskId) -> Result<(), BackendError> {
        let to = self.claimed(id);
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // One rename is the whole claim; a losing racer sees NotFound,
        // never partial state.
        match tokio::fs::rename(self.pending(id), &to).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(BackendError::NotReady(id.clone())),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_task(&self, id: &TaskId) -> Result<Task, BackendError> {
        let candidates = [self.claimed(id), self.pending(id), self.done(id)];
        let Some(path) = candidates.iter().find(|p| p.exists()) else {
            return Err(BackendError::NotFound(id.clone()));
        };
        let content = tokio::fs::read_to_string(path).await?;
        let (title, body) = parse_task_file(&content);
        let error = match tokio::fs::read_to_string(self.error_file(id)).await {
            Ok(text) => Some(text.trim().to_string()),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        Ok(Task {
            id: id.clone(),
            title: if title.is_empty() { id.to_string() } else { title },
            body,
            backend_ref: path.display().to_string(),
            error,
        })
    }

    async fn complete_task(&self, id: &TaskId, artifact: &str) -> Result<(), BackendError> {
        let from = self.claimed(id);
        let to = self.done(id);
        if !from.exists() {
            if to.exists() {
                // Repeat of an applied completion
                return Ok(());
            }
            if self.pending(id).exists() {
                return Err(BackendError::WrongStage {
                    id: id.clone(),
                    expected: "claimed".to_string(),
                    actual: "ready".to_string(),
                });
            }
            return Err(BackendError::NotFound(id.clone()));
        }

        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(&from, &to).await?;

        // Record the artifact inside the done file for later inspection
        let mut content = tokio::fs::read_to_string(&to).await?;
        if !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(&format!("\n<!-- artifact: {artifact} -->\n"));
        tokio::fs::write(&to, content).await?;

        // A finished task's old failure is no longer interesting
        let _ = tokio::fs::remove_file(self.error_file(id)).await;
        Ok(())
    }

    async fn fail_task(&self, id: &TaskId, error: &str) -> Result<(), BackendError> {
        if self.done(id).exists() {
            return Err(BackendError::Stale {
                id: id.clone(),
                stage: "done".to_string(),
            });
        }

        let claimed = self.claimed(id);
        let pending = self.pending(id);
        if !claimed.exists() && !pending.exists() {
            return Err(BackendError::NotFound(id.clone()));
        }

        let sidecar = self.error_file(id);
        if let Some(parent) = sidecar.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&sidecar, error).await?;

        if claimed.exists() {
            // Failed tasks requeue in this store
            if let Some(parent) = pending.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            match tokio::fs::rename(&claimed, &pending).await {
                Ok(()) => {}
                // A concurrent repeat already requeued it
                Err(e) if e.kind() == ErrorKind::NotFound && pending.exists() => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn comment(&self, id: &TaskId, message: &str) -> Result<(), BackendError> {
        let path = self.note_file(id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let line = format!(
            "[{}] {}\n",
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
            message
        );
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "fsqueue_tests.rs"]
mod tests;
