// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ownership of spawned worker handles

use chrono::{DateTime, Utc};
use drover_core::TaskId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Tracker errors
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("task {0} already has a live worker")]
    AlreadyTracked(TaskId),
}

struct WorkerHandle {
    project: String,
    spawned_at: DateTime<Utc>,
    handle: JoinHandle<()>,
}

/// A finished worker removed during `reap`
#[derive(Debug, Clone, PartialEq)]
pub struct ReapedWorker {
    pub task_id: TaskId,
    pub project: String,
}

/// Point-in-time view of one tracked worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub task_id: TaskId,
    pub project: String,
    pub spawned_at: DateTime<Utc>,
    pub alive: bool,
}

/// Owns the join handle of every spawned worker.
///
/// At most one live handle per task id: a task cannot be registered again
/// until its previous worker finishes. Finished handles stay counted out of
/// the live totals but occupy the map until `reap` removes them.
#[derive(Default)]
pub struct ProcessTracker {
    workers: HashMap<TaskId, WorkerHandle>,
}

impl ProcessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a spawned worker. Refused while the task still has a live
    /// handle; a finished one is replaced.
    pub fn register(
        &mut self,
        task_id: TaskId,
        project: &str,
        spawned_at: DateTime<Utc>,
        handle: JoinHandle<()>,
    ) -> Result<(), TrackerError> {
        if let Some(existing) = self.workers.get(&task_id) {
            if !existing.handle.is_finished() {
                return Err(TrackerError::AlreadyTracked(task_id));
            }
        }
        self.workers.insert(
            task_id,
            WorkerHandle {
                project: project.to_string(),
                spawned_at,
                handle,
            },
        );
        Ok(())
    }

    /// Remove finished handles, freeing their slots for admission
    pub fn reap(&mut self) -> Vec<ReapedWorker> {
        let finished: Vec<TaskId> = self
            .workers
            .iter()
            .filter(|(_, w)| w.handle.is_finished())
            .map(|(id, _)| id.clone())
            .collect();

        let mut reaped = Vec::new();
        for id in finished {
            if let Some(worker) = self.workers.remove(&id) {
                reaped.push(ReapedWorker {
                    task_id: id,
                    project: worker.project,
                });
            }
        }
        reaped.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        reaped
    }

    /// Live workers for one project. `is_finished` is checked at count
    /// time, so a worker that just ended does not hold a slot.
    pub fn active_count(&self, project: &str) -> usize {
        self.workers
            .values()
            .filter(|w| w.project == project && !w.handle.is_finished())
            .count()
    }

    /// Live workers across all projects
    pub fn active_total(&self) -> usize {
        self.workers
            .values()
            .filter(|w| !w.handle.is_finished())
            .count()
    }

    /// Whether this task has a live worker right now
    pub fn is_active(&self, task_id: &TaskId) -> bool {
        self.workers
            .get(task_id)
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// All tracked workers, sorted by task id
    pub fn snapshot(&self) -> Vec<WorkerStatus> {
        let mut statuses: Vec<WorkerStatus> = self
            .workers
            .iter()
            .map(|(id, w)| WorkerStatus {
                task_id: id.clone(),
                project: w.project.clone(),
                spawned_at: w.spawned_at,
                alive: !w.handle.is_finished(),
            })
            .collect();
        statuses.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        statuses
    }

    /// Abort every tracked worker, for shutdown. Returns how many were
    /// still live when aborted.
    pub fn abort_all(&mut self) -> usize {
        let mut aborted = 0;
        for worker in self.workers.values() {
            if !worker.handle.is_finished() {
                aborted += 1;
            }
            worker.handle.abort();
        }
        self.workers.clear();
        aborted
    }
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;
