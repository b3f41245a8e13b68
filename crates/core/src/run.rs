// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run records: the per-task execution record a worker maintains.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::TaskId;

/// Where a run currently sits in the worker lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Claimed,
    Running,
    Pushing,
    Done,
    Failed,
}

impl RunStatus {
    /// Terminal statuses are never revisited. A non-terminal record with no
    /// live worker behind it is an orphaned claim.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Done | RunStatus::Failed)
    }

    pub fn name(self) -> &'static str {
        match self {
            RunStatus::Claimed => "claimed",
            RunStatus::Running => "running",
            RunStatus::Pushing => "pushing",
            RunStatus::Done => "done",
            RunStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One worker's execution of one task.
///
/// Overwritten in place as the worker progresses, so an observer sees the
/// current phase rather than a history of past phases. Records are kept
/// after completion for inspection; the scheduler never reads them back
/// when making dispatch decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub task_id: TaskId,
    pub project: String,
    pub title: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub branch_name: Option<String>,
    pub artifact_ref: Option<String>,
    pub error: Option<String>,
}

impl RunRecord {
    /// New record at the claimed stage. The title starts as the task id and
    /// is replaced once the worker fetches task detail.
    pub fn claimed(task_id: TaskId, project: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            title: task_id.0.clone(),
            task_id,
            project: project.into(),
            status: RunStatus::Claimed,
            started_at: now,
            finished_at: None,
            branch_name: None,
            artifact_ref: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Mark the run done, recording the published artifact. An error noted
    /// along the way (a deferred review, say) is deliberately kept.
    pub fn finish_done(&mut self, artifact: Option<String>, now: DateTime<Utc>) {
        self.status = RunStatus::Done;
        self.artifact_ref = artifact;
        self.finished_at = Some(now);
    }

    /// Mark the run failed with the reconciled error
    pub fn finish_failed(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.status = RunStatus::Failed;
        self.error = Some(error.into());
        self.finished_at = Some(now);
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
