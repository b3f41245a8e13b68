// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task backends: the six-operation contract over heterogeneous stores.
//!
//! Every store presents the same surface: list ready work, claim it
//! exclusively, fetch detail, and reconcile the outcome. `claim_task` must
//! be exclusive (of two racing claimants, at most one wins), and
//! `complete_task`/`fail_task` must tolerate repeats, since a worker retry
//! may replay them.

mod actions;
mod fsqueue;
mod labels;

pub use actions::ActionBackend;
pub use fsqueue::FsQueueBackend;
pub use labels::{LabelBackend, LabelNames};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{BackendCall, FakeBackend, FakeStage};

use async_trait::async_trait;
use drover_core::config::BackendConfig;
use drover_core::{Project, Task, TaskId};
use thiserror::Error;

/// Errors from backend operations
#[derive(Debug, Error)]
pub enum BackendError {
    /// Claim lost, or the task left the ready state first
    #[error("task {0} not found in ready state")]
    NotReady(TaskId),

    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// Refused transition that would move a task backward
    #[error("task {id} is already {stage}; refusing to move it backward")]
    Stale { id: TaskId, stage: String },

    /// Operation requires a stage the task is not at
    #[error("task {id} is {actual}, expected {expected}")]
    WrongStage {
        id: TaskId,
        expected: String,
        actual: String,
    },

    #[error("command failed: {0}")]
    CommandFailed(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The six-operation contract every task store implements
#[async_trait]
pub trait TaskBackend: Clone + Send + Sync + 'static {
    /// Task ids currently ready for dispatch
    async fn list_ready_tasks(&self) -> Result<Vec<TaskId>, BackendError>;

    /// Exclusively transition ready → claimed; fails unless currently ready
    async fn claim_task(&self, id: &TaskId) -> Result<(), BackendError>;

    /// Fetch title, body, and the backend-specific reference
    async fn get_task(&self, id: &TaskId) -> Result<Task, BackendError>;

    /// Transition to done, recording the artifact. Repeat-safe.
    async fn complete_task(&self, id: &TaskId, artifact: &str) -> Result<(), BackendError>;

    /// Record a failure; whether the task requeues is the store's policy.
    /// Repeat-safe.
    async fn fail_task(&self, id: &TaskId, error: &str) -> Result<(), BackendError>;

    /// Best-effort progress notice; callers may ignore failures
    async fn comment(&self, id: &TaskId, message: &str) -> Result<(), BackendError>;
}

/// Dispatching enum over the concrete stores, so one scheduler can serve
/// projects with different storage models.
#[derive(Clone)]
pub enum AnyBackend {
    Labels(LabelBackend),
    FsQueue(FsQueueBackend),
    Actions(ActionBackend),
}

impl AnyBackend {
    /// Build the backend a project's configuration names
    pub fn from_project(project: &Project) -> Result<Self, BackendError> {
        match &project.backend {
            BackendConfig::Labels {
                tracker,
                ready_label,
                claimed_label,
                review_label,
            } => Ok(Self::Labels(LabelBackend::new(
                tracker.clone(),
                LabelNames {
                    ready: ready_label.clone(),
                    claimed: claimed_label.clone(),
                    review: review_label.clone(),
                },
            ))),
            BackendConfig::Fsqueue { root } => Ok(Self::FsQueue(FsQueueBackend::new(root.clone()))),
            BackendConfig::Actions { db, queue } => {
                Ok(Self::Actions(ActionBackend::open(db, queue.clone())?))
            }
        }
    }
}

#[async_trait]
impl TaskBackend for AnyBackend {
    async fn list_ready_tasks(&self) -> Result<Vec<TaskId>, BackendError> {
        match self {
            Self::Labels(b) => b.list_ready_tasks().await,
            Self::FsQueue(b) => b.list_ready_tasks().await,
            Self::Actions(b) => b.list_ready_tasks().await,
        }
    }

    async fn claim_task(&self, id: &TaskId) -> Result<(), BackendError> {
        match self {
            Self::Labels(b) => b.claim_task(id).await,
            Self::FsQueue(b) => b.claim_task(id).await,
            Self::Actions(b) => b.claim_task(id).await,
        }
    }

    async fn get_task(&self, id: &TaskId) -> Result<Task, BackendError> {
        match self {
            Self::Labels(b) => b.get_task(id).await,
            Self::FsQueue(b) => b.get_task(id).await,
            Self::Actions(b) => b.get_task(id).await,
        }
    }

    async fn complete_task(&self, id: &TaskId, artifact: &str) -> Result<(), BackendError> {
        match self {
            Self::Labels(b) => b.complete_task(id, artifact).await,
            Self::FsQueue(b) => b.complete_task(id, artifact).await,
            Self::Actions(b) => b.complete_task(id, artifact).await,
        }
    }

    async fn fail_task(&self, id: &TaskId, error: &str) -> Result<(), BackendError> {
        match self {
            Self::Labels(b) => b.fail_task(id, error).await,
            Self::FsQueue(b) => b.fail_task(id, error).await,
            Self::Actions(b) => b.fail_task(id, error).await,
        }
    }

    async fn comment(&self, id: &TaskId, message: &str) -> Result<(), BackendError> {
        match self {
            Self::Labels(b) => b.comment(id, message).await,
            Self::FsQueue(b) => b.comment(id, message).await,
            Self::Actions(b) => b.comment(id, message).await,
        }
    }
}
