// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orphan detection: claims whose worker no longer exists

use chrono::{DateTime, Utc};
use drover_core::{RunRecord, RunStatus, TaskId};
use serde::{Deserialize, Serialize};

use crate::tracker::ProcessTracker;

/// A run record stuck mid-lifecycle with no live worker behind it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrphanedClaim {
    pub task_id: TaskId,
    pub project: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub branch_name: Option<String>,
}

/// Non-terminal records with no live worker.
///
/// Surfaced for operators rather than auto-resolved: the task may still
/// hold a claim in its backend, and releasing that claim is a judgment
/// call drover does not make on its own.
pub fn orphaned_claims(records: &[RunRecord], tracker: &ProcessTracker) -> Vec<OrphanedClaim> {
    records
        .iter()
        .filter(|record| !record.is_terminal() && !tracker.is_active(&record.task_id))
        .map(|record| OrphanedClaim {
            task_id: record.task_id.clone(),
            project: record.project.clone(),
            status: record.status,
            started_at: record.started_at,
            branch_name: record.branch_name.clone(),
        })
        .collect()
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
