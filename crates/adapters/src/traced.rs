// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use async_trait::async_trait;
use drover_core::{Task, TaskId};
use std::path::Path;
use tracing::Instrument;

use crate::backend::{BackendError, TaskBackend};
use crate::repo::{RepoAdapter, RepoError};

/// Wrapper that adds tracing to any TaskBackend
#[derive(Clone)]
pub struct TracedTaskBackend<B> {
    inner: B,
}

impl<B> TracedTaskBackend<B> {
    pub fn new(inner: B) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<B: TaskBackend> TaskBackend for TracedTaskBackend<B> {
    async fn list_ready_tasks(&self) -> Result<Vec<TaskId>, BackendError> {
        let result = self.inner.list_ready_tasks().await;
        tracing::trace!(count = result.as_ref().map(|v| v.len()).ok(), "listed ready tasks");
        result
    }

    async fn claim_task(&self, id: &TaskId) -> Result<(), BackendError> {
        let span = tracing::info_span!("backend.claim", task_id = %id);
        let start = std::time::Instant::now();
        let result = self.inner.claim_task(id).instrument(span.clone()).await;
        let elapsed = start.elapsed();

        span.in_scope(|| match &result {
            Ok(()) => tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "claimed"),
            // Losing a claim race is normal operation
            Err(BackendError::NotReady(_)) => {
                tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "claim lost")
            }
            Err(e) => tracing::error!(
                elapsed_ms = elapsed.as_millis() as u64,
                error = %e,
                "claim failed"
            ),
        });

        result
    }

    async fn get_task(&self, id: &TaskId) -> Result<Task, BackendError> {
        let result = self.inner.get_task(id).await;
        match &result {
            Ok(task) => tracing::debug!(task_id = %id, title = %task.title, "fetched task"),
            Err(e) => tracing::error!(task_id = %id, error = %e, "get_task failed"),
        }
        result
    }

    async fn complete_task(&self, id: &TaskId, artifact: &str) -> Result<(), BackendError> {
        let span = tracing::info_span!("backend.complete", task_id = %id);
        let start = std::time::Instant::now();
        let result = self
            .inner
            .complete_task(id, artifact)
            .instrument(span.clone())
            .await;
        let elapsed = start.elapsed();

        span.in_scope(|| match &result {
            Ok(()) => tracing::info!(
                artifact,
                elapsed_ms = elapsed.as_millis() as u64,
                "completed"
            ),
            Err(e) => tracing::error!(
                elapsed_ms = elapsed.as_millis() as u64,
                error = %e,
                "complete failed"
            ),
        });

        result
    }

    async fn fail_task(&self, id: &TaskId, error: &str) -> Result<(), BackendError> {
        let span = tracing::info_span!("backend.fail", task_id = %id);
        let result = self.inner.fail_task(id, error).instrument(span.clone()).await;

        span.in_scope(|| match &result {
            Ok(()) => tracing::info!(error, "failure recorded"),
            Err(e) => tracing::error!(error = %e, "fail_task failed"),
        });

        result
    }

    async fn comment(&self, id: &TaskId, message: &str) -> Result<(), BackendError> {
        let result = self.inner.comment(id, message).await;
        // comment() failing is acceptable (notices are best-effort)
        match &result {
            Ok(()) => tracing::debug!(task_id = %id, "comment posted"),
            Err(e) => tracing::warn!(task_id = %id, error = %e, "comment failed (may be expected)"),
        }
        result
    }
}

/// Wrapper that adds tracing to any RepoAdapter
#[derive(Clone)]
pub struct TracedRepoAdapter<R> {
    inner: R,
}

impl<R> TracedRepoAdapter<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<R: RepoAdapter> RepoAdapter for TracedRepoAdapter<R> {
    async fn clone_repo(&self, source: &str, dest: &Path, base: &str) -> Result<(), RepoError> {
        let span = tracing::info_span!("repo.clone", source, dest = %dest.display());

        // Precondition: parent directory should exist
        if let Some(parent) = dest.parent() {
            if !parent.exists() {
                span.in_scope(|| {
                    tracing::error!(parent = %parent.display(), "parent directory does not exist")
                });
                return Err(RepoError::CloneFailed(format!(
                    "parent directory does not exist: {}",
                    parent.display()
                )));
            }
        }

        let start = std::time::Instant::now();
        let result = self
            .inner
            .clone_repo(source, dest, base)
            .instrument(span.clone())
            .await;
        let elapsed = start.elapsed();

        span.in_scope(|| match &result {
            Ok(()) => tracing::info!(base, elapsed_ms = elapsed.as_millis() as u64, "cloned"),
            Err(e) => tracing::error!(
                elapsed_ms = elapsed.as_millis() as u64,
                error = %e,
                "clone failed"
            ),
        });

        result
    }

    async fn create_branch(&self, dir: &Path, name: &str) -> Result<(), RepoError> {
        let result = self.inner.create_branch(dir, name).await;
        match &result {
            Ok(()) => tracing::info!(branch = name, "branch created"),
            Err(e) => tracing::error!(branch = name, error = %e, "branch failed"),
        }
        result
    }

    async fn commit_count(&self, dir: &Path, base: &str) -> Result<u32, RepoError> {
        let result = self.inner.commit_count(dir, base).await;
        tracing::trace!(count = result.as_ref().ok(), "counted commits");
        result
    }

    async fn push(&self, dir: &Path, branch: &str) -> Result<(), RepoError> {
        let span = tracing::info_span!("repo.push", branch);
        let start = std::time::Instant::now();
        let result = self.inner.push(dir, branch).instrument(span.clone()).await;
        let elapsed = start.elapsed();

        span.in_scope(|| match &result {
            Ok(()) => tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "pushed"),
            Err(e) => tracing::error!(
                elapsed_ms = elapsed.as_millis() as u64,
                error = %e,
                "push failed"
            ),
        });

        result
    }

    async fn open_review(
        &self,
        dir: &Path,
        branch: &str,
        title: &str,
        body: &str,
    ) -> Result<String, RepoError> {
        let span = tracing::info_span!("repo.open_review", branch);
        let result = self
            .inner
            .open_review(dir, branch, title, body)
            .instrument(span.clone())
            .await;

        span.in_scope(|| match &result {
            Ok(url) => tracing::info!(url = %url, "review opened"),
            // Review creation gets retried by the caller
            Err(e) => tracing::warn!(error = %e, "review creation failed"),
        });

        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
