// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake task backend for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use async_trait::async_trait;
use drover_core::{Task, TaskId};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{BackendError, TaskBackend};

/// Recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    ListReady,
    Claim(TaskId),
    Get(TaskId),
    Complete { id: TaskId, artifact: String },
    Fail { id: TaskId, error: String },
    Comment { id: TaskId, message: String },
}

/// Stage a fake task sits at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeStage {
    Ready,
    Claimed,
    Done,
    /// Parked terminally; only used when requeue-on-fail is off
    Failed,
}

#[derive(Debug, Clone)]
struct FakeTask {
    title: String,
    body: String,
    stage: FakeStage,
    artifact: Option<String>,
    error: Option<String>,
}

/// In-memory backend with scriptable failures.
///
/// Tasks iterate in id order (BTreeMap), so dispatch order in tests is
/// deterministic.
#[derive(Clone)]
pub struct FakeBackend {
    tasks: Arc<Mutex<BTreeMap<TaskId, FakeTask>>>,
    calls: Arc<Mutex<Vec<BackendCall>>>,
    list_errors: Arc<Mutex<VecDeque<String>>>,
    denied_claims: Arc<Mutex<HashSet<TaskId>>>,
    requeue_on_fail: Arc<Mutex<bool>>,
    stale_listing: Arc<Mutex<bool>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            tasks: Arc::new(Mutex::new(BTreeMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            list_errors: Arc::new(Mutex::new(VecDeque::new())),
            denied_claims: Arc::new(Mutex::new(HashSet::new())),
            requeue_on_fail: Arc::new(Mutex::new(true)),
            stale_listing: Arc::new(Mutex::new(false)),
        }
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a ready task
    pub fn push_task(&self, id: impl Into<TaskId>, title: &str, body: &str) {
        self.tasks_mut().insert(
            id.into(),
            FakeTask {
                title: title.to_string(),
                body: body.to_string(),
                stage: FakeStage::Ready,
                artifact: None,
                error: None,
            },
        );
    }

    /// Script the next `list_ready_tasks` to fail with this message
    pub fn fail_next_list(&self, message: &str) {
        self.list_errors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(message.to_string());
    }

    /// Make claims on this id lose, as if another claimant won the race
    pub fn deny_claim(&self, id: impl Into<TaskId>) {
        self.denied_claims
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.into());
    }

    /// Park failed tasks terminally instead of requeueing them
    pub fn park_failures(&self) {
        *self.requeue_on_fail.lock().unwrap_or_else(|e| e.into_inner()) = false;
    }

    /// Keep returning claimed tasks from list, as a lagging store would
    pub fn serve_stale_listings(&self) {
        *self.stale_listing.lock().unwrap_or_else(|e| e.into_inner()) = true;
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn stage_of(&self, id: &TaskId) -> Option<FakeStage> {
        self.tasks_mut().get(id).map(|t| t.stage)
    }

    pub fn error_of(&self, id: &TaskId) -> Option<String> {
        self.tasks_mut().get(id).and_then(|t| t.error.clone())
    }

    pub fn artifact_of(&self, id: &TaskId) -> Option<String> {
        self.tasks_mut().get(id).and_then(|t| t.artifact.clone())
    }

    fn tasks_mut(&self) -> MutexGuard<'_, BTreeMap<TaskId, FakeTask>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
    }
}

#[async_trait]
impl TaskBackend for FakeBackend {
    async fn list_ready_tasks(&self) -> Result<Vec<TaskId>, BackendError> {
        self.record(BackendCall::ListReady);
        if let Some(message) = self
            .list_errors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
        {
            return Err(BackendError::Store(message));
        }
        let stale = *self.stale_listing.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self
            .tasks_mut()
            .iter()
            .filter(|(_, t)| {
                t.stage == FakeStage::Ready || (stale && t.stage == FakeStage::Claimed)
            })
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn claim_task(&self, id: &TaskId) -> Result<(), BackendError> {
        self.record(BackendCall::Claim(id.clone()));
        if self
            .denied_claims
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(id)
        {
            return Err(BackendError::NotReady(id.clone()));
        }
        let mut tasks = self.tasks_mut();
        let Some(task) = tasks.get_mut(id) else {
            return Err(BackendError::NotFound(id.clone()));
        };
        if task.stage != FakeStage::Ready {
            return Err(BackendError::NotReady(id.clone()));
        }
        task.stage = FakeStage::Claimed;
        Ok(())
    }

    async fn get_task(&self, id: &TaskId) -> Result<Task, BackendError> {
        self.record(BackendCall::Get(id.clone()));
        let tasks = self.tasks_mut();
        let Some(task) = tasks.get(id) else {
            return Err(BackendError::NotFound(id.clone()));
        };
        Ok(Task {
            id: id.clone(),
            title: task.title.clone(),
            body: task.body.clone(),
            backend_ref: format!("fake:{id}"),
            error: task.error.clone(),
        })
    }

    async fn complete_task(&self, id: &TaskId, artifact: &str) -> Result<(), BackendError> {
        self.record(BackendCall::Complete {
            id: id.clone(),
            artifact: artifact.to_string(),
        });
        let mut tasks = self.tasks_mut();
        let Some(task) = tasks.get_mut(id) else {
            return Err(BackendError::NotFound(id.clone()));
        };
        match task.stage {
            FakeStage::Claimed => {
                task.stage = FakeStage::Done;
                task.artifact = Some(artifact.to_string());
                task.error = None;
                Ok(())
            }
            FakeStage::Done => Ok(()),
            FakeStage::Ready => Err(BackendError::WrongStage {
                id: id.clone(),
                expected: "claimed".to_string(),
                actual: "ready".to_string(),
            }),
            FakeStage::Failed => Err(BackendError::Stale {
                id: id.clone(),
                stage: "failed".to_string(),
            }),
        }
    }

    async fn fail_task(&self, id: &TaskId, error: &str) -> Result<(), BackendError> {
        self.record(BackendCall::Fail {
            id: id.clone(),
            error: error.to_string(),
        });
        let requeue = *self.requeue_on_fail.lock().unwrap_or_else(|e| e.into_inner());
        let mut tasks = self.tasks_mut();
        let Some(task) = tasks.get_mut(id) else {
            return Err(BackendError::NotFound(id.clone()));
        };
        match task.stage {
            FakeStage::Claimed | FakeStage::Ready => {
                task.stage = if requeue {
                    FakeStage::Ready
                } else {
                    FakeStage::Failed
                };
                task.error = Some(error.to_string());
                Ok(())
            }
            FakeStage::Failed => Ok(()),
            FakeStage::Done => Err(BackendError::Stale {
                id: id.clone(),
                stage: "done".to_string(),
            }),
        }
    }

    async fn comment(&self, id: &TaskId, message: &str) -> Result<(), BackendError> {
        self.record(BackendCall::Comment {
            id: id.clone(),
            message: message.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
