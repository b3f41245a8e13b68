// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task identity and lifecycle stages.
//!
//! Backends encode a task's position in the ready → claimed → review
//! ordering differently (labels, queue directories, a status column), but
//! they all consult the same transition gate, so a retried operation can
//! never move a task backward.

use serde::{Deserialize, Serialize};

/// Unique identifier for a task within its backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        TaskId(s)
    }
}

/// Task detail as returned by a backend's `get_task`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub body: String,
    /// Opaque locator understood only by the owning backend
    pub backend_ref: String,
    /// Last recorded failure, for stores that keep one
    pub error: Option<String>,
}

/// Position in the task lifecycle.
///
/// The derived ordering is load-bearing: `Ready < Claimed < Review`, and
/// the gate below compares stages to decide whether a transition applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStage {
    Ready,
    Claimed,
    Review,
}

/// Outcome of validating a stage transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Forward move; apply it
    Apply,
    /// Already at the target stage; a repeat of an applied transition
    Noop,
    /// Would move the task backward; refuse
    Regression,
}

impl TaskStage {
    /// Validate a move from this stage to `target`
    pub fn validate(self, target: TaskStage) -> Transition {
        match target.cmp(&self) {
            std::cmp::Ordering::Greater => Transition::Apply,
            std::cmp::Ordering::Equal => Transition::Noop,
            std::cmp::Ordering::Less => Transition::Regression,
        }
    }

    /// Whether a claim may proceed from this stage.
    ///
    /// Claiming is stricter than the general gate: a task someone else
    /// already claimed is a conflict, not a no-op.
    pub fn claimable(self) -> bool {
        self == TaskStage::Ready
    }

    pub fn name(self) -> &'static str {
        match self {
            TaskStage::Ready => "ready",
            TaskStage::Claimed => "claimed",
            TaskStage::Review => "review",
        }
    }
}

impl std::fmt::Display for TaskStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
