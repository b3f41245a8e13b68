// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Repository adapters: workspace clones, branches, publishing.
//!
//! The adapter is stateless over explicit workspace directories, so a
//! single instance serves every project the daemon polls.

mod git;

pub use git::GitAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeRepoAdapter, RepoCall};

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors from repo operations
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("clone failed: {0}")]
    CloneFailed(String),

    #[error("branch already exists: {0}")]
    BranchExists(String),

    #[error("review creation failed: {0}")]
    ReviewFailed(String),

    #[error("command failed: {0}")]
    CommandFailed(String),
}

/// Adapter for git and forge operations
#[async_trait]
pub trait RepoAdapter: Clone + Send + Sync + 'static {
    /// Clone `source` at branch `base` into `dest`
    async fn clone_repo(&self, source: &str, dest: &Path, base: &str) -> Result<(), RepoError>;

    /// Create and switch to a new branch in `dir`
    async fn create_branch(&self, dir: &Path, name: &str) -> Result<(), RepoError>;

    /// Commits in `dir` ahead of `base`
    async fn commit_count(&self, dir: &Path, base: &str) -> Result<u32, RepoError>;

    /// Push `branch` to origin
    async fn push(&self, dir: &Path, branch: &str) -> Result<(), RepoError>;

    /// Open a change request for `branch`; returns its locator
    async fn open_review(
        &self,
        dir: &Path,
        branch: &str,
        title: &str,
        body: &str,
    ) -> Result<String, RepoError>;
}
