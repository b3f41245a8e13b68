// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Polling scheduler: admission control and worker dispatch.
//!
//! Each cycle runs against one immutable registry snapshot. Projects are
//! visited in registration order, so when slots are scarce the earlier
//! project wins. Claims happen before spawns: a claim lost to another
//! orchestrator costs nothing but the claim attempt.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use drover_adapters::{AgentRunner, RepoAdapter, TaskBackend};
use drover_core::{Clock, IdGen, Project, RunRecord, TaskId};
use drover_storage::RunStore;

use crate::tracker::{ProcessTracker, TrackerError};
use crate::worker::{Worker, WorkerDeps, WorkerSettings};

/// What one scheduling cycle did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleStats {
    /// Finished workers removed from the tracker
    pub reaped: usize,
    /// Workers spawned this cycle
    pub spawned: usize,
    /// Projects whose ready listing failed
    pub failed_projects: usize,
}

/// Poller dependencies, cloned into each spawned worker
pub struct PollerDeps<R, A, C, I> {
    pub tracker: Arc<Mutex<ProcessTracker>>,
    pub runs: RunStore,
    pub repo: R,
    pub agent: A,
    pub clock: C,
    pub ids: I,
}

/// The scheduling loop body
pub struct Poller<R, A, C: Clock, I: IdGen> {
    deps: PollerDeps<R, A, C, I>,
    settings: WorkerSettings,
    /// When each project was last actually listed
    last_polled: HashMap<String, DateTime<Utc>>,
}

impl<R, A, C, I> Poller<R, A, C, I>
where
    R: RepoAdapter,
    A: AgentRunner,
    C: Clock + 'static,
    I: IdGen + 'static,
{
    pub fn new(deps: PollerDeps<R, A, C, I>, settings: WorkerSettings) -> Self {
        Self {
            deps,
            settings,
            last_polled: HashMap::new(),
        }
    }

    pub fn tracker(&self) -> Arc<Mutex<ProcessTracker>> {
        Arc::clone(&self.deps.tracker)
    }

    /// One scheduling pass over the registry snapshot.
    ///
    /// A failure anywhere in one project (listing, claims) never blocks
    /// the others; the cycle carries on with the next project.
    pub async fn run_cycle<B: TaskBackend>(
        &mut self,
        global_ceiling: usize,
        projects: &[(Project, B)],
    ) -> CycleStats {
        let mut stats = CycleStats::default();
        let now = self.deps.clock.now();

        // Reap first so workers that finished since last cycle free their
        // slots for this one
        let reaped = {
            let mut tracker = self.lock_tracker();
            tracker.reap()
        };
        for worker in &reaped {
            tracing::debug!(task_id = %worker.task_id, project = %worker.project, "worker reaped");
        }
        stats.reaped = reaped.len();

        let mut global_live = self.lock_tracker().active_total();

        for (project, backend) in projects {
            if !self.due(project, now) {
                continue;
            }

            let project_live = self.lock_tracker().active_count(&project.name);
            let project_slots = project.max_workers.saturating_sub(project_live);
            let global_slots = global_ceiling.saturating_sub(global_live);
            let mut slots = project_slots.min(global_slots);
            if slots == 0 {
                tracing::debug!(project = %project.name, "no free slots");
                continue;
            }
            // A slot-starved pass does not count as a poll
            self.last_polled.insert(project.name.clone(), now);

            let candidates = match backend.list_ready_tasks().await {
                Ok(candidates) => candidates,
                Err(e) => {
                    tracing::warn!(project = %project.name, error = %e, "ready listing failed");
                    stats.failed_projects += 1;
                    continue;
                }
            };

            for task_id in candidates {
                if slots == 0 {
                    break;
                }
                // A lagging store may still list a task we are running
                if self.lock_tracker().is_active(&task_id) {
                    continue;
                }
                if let Err(e) = backend.claim_task(&task_id).await {
                    // Normal under races: another orchestrator got there first
                    tracing::info!(
                        task_id = %task_id,
                        project = %project.name,
                        error = %e,
                        "claim lost"
                    );
                    continue;
                }
                match self.spawn_worker(backend, project, &task_id, now) {
                    Ok(()) => {
                        slots -= 1;
                        global_live += 1;
                        stats.spawned += 1;
                    }
                    Err(e) => {
                        tracing::warn!(task_id = %task_id, error = %e, "spawn refused");
                    }
                }
            }
        }

        stats
    }

    /// Whether this project should be listed this cycle. Projects without
    /// an own interval follow the cycle cadence; an explicit interval
    /// slows them down.
    fn due(&self, project: &Project, now: DateTime<Utc>) -> bool {
        let Some(interval) = project.poll_interval else {
            return true;
        };
        let Some(last) = self.last_polled.get(&project.name) else {
            return true;
        };
        let interval =
            chrono::Duration::from_std(interval).unwrap_or_else(|_| chrono::Duration::zero());
        now.signed_duration_since(*last) >= interval
    }

    /// Record the claim, then spawn and register under one tracker lock.
    /// The record exists before the worker does, so a crash between claim
    /// and spawn still leaves an orphan the reconciler can report.
    fn spawn_worker<B: TaskBackend>(
        &self,
        backend: &B,
        project: &Project,
        task_id: &TaskId,
        now: DateTime<Utc>,
    ) -> Result<(), TrackerError> {
        let record = RunRecord::claimed(task_id.clone(), &project.name, now);
        if let Err(e) = self.deps.runs.save(&record) {
            tracing::warn!(task_id = %task_id, error = %e, "claim record save failed");
        }

        let worker = Worker::new(
            WorkerDeps {
                backend: backend.clone(),
                repo: self.deps.repo.clone(),
                agent: self.deps.agent.clone(),
                clock: self.deps.clock.clone(),
                ids: self.deps.ids.clone(),
                runs: self.deps.runs.clone(),
            },
            project.clone(),
            self.settings.clone(),
        );

        let mut tracker = self.lock_tracker();
        if tracker.is_active(task_id) {
            return Err(TrackerError::AlreadyTracked(task_id.clone()));
        }
        let handle = tokio::spawn(worker.execute(task_id.clone()));
        tracker.register(task_id.clone(), &project.name, now, handle)
    }

    fn lock_tracker(&self) -> std::sync::MutexGuard<'_, ProcessTracker> {
        self.deps.tracker.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
#[path = "poller_tests.rs"]
mod tests;
