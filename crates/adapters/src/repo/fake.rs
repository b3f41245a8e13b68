// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake repo adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::{RepoAdapter, RepoError};

/// Recorded repo call
#[derive(Debug, Clone, PartialEq)]
pub enum RepoCall {
    Clone {
        source: String,
        dest: PathBuf,
        base: String,
    },
    CreateBranch {
        dir: PathBuf,
        name: String,
    },
    CommitCount {
        dir: PathBuf,
        base: String,
    },
    Push {
        dir: PathBuf,
        branch: String,
    },
    OpenReview {
        dir: PathBuf,
        branch: String,
        title: String,
    },
}

/// In-memory repo adapter with scriptable outcomes
#[derive(Clone)]
pub struct FakeRepoAdapter {
    calls: Arc<Mutex<Vec<RepoCall>>>,
    commit_count: Arc<Mutex<u32>>,
    clone_error: Arc<Mutex<Option<String>>>,
    push_error: Arc<Mutex<Option<String>>>,
    /// Scripted review outcomes, consumed front to back; empty means
    /// success with a synthesized locator
    review_script: Arc<Mutex<VecDeque<Result<String, String>>>>,
}

impl Default for FakeRepoAdapter {
    fn default() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            commit_count: Arc::new(Mutex::new(1)),
            clone_error: Arc::new(Mutex::new(None)),
            push_error: Arc::new(Mutex::new(None)),
            review_script: Arc::new(Mutex::new(VecDeque::new())),
        }
    }
}

impl FakeRepoAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RepoCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_commit_count(&self, count: u32) {
        *self.commit_count.lock().unwrap_or_else(|e| e.into_inner()) = count;
    }

    pub fn fail_clone(&self, message: &str) {
        *self.clone_error.lock().unwrap_or_else(|e| e.into_inner()) = Some(message.to_string());
    }

    pub fn fail_push(&self, message: &str) {
        *self.push_error.lock().unwrap_or_else(|e| e.into_inner()) = Some(message.to_string());
    }

    /// Queue the outcome of the next `open_review`
    pub fn script_review(&self, outcome: Result<&str, &str>) {
        self.review_script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(match outcome {
                Ok(url) => Ok(url.to_string()),
                Err(msg) => Err(msg.to_string()),
            });
    }

    fn record(&self, call: RepoCall) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
    }
}

#[async_trait]
impl RepoAdapter for FakeRepoAdapter {
    async fn clone_repo(&self, source: &str, dest: &Path, base: &str) -> Result<(), RepoError> {
        self.record(RepoCall::Clone {
            source: source.to_string(),
            dest: dest.to_path_buf(),
            base: base.to_string(),
        });
        match self.clone_error.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            Some(message) => Err(RepoError::CloneFailed(message)),
            None => Ok(()),
        }
    }

    async fn create_branch(&self, dir: &Path, name: &str) -> Result<(), RepoError> {
        self.record(RepoCall::CreateBranch {
            dir: dir.to_path_buf(),
            name: name.to_string(),
        });
        Ok(())
    }

    async fn commit_count(&self, dir: &Path, base: &str) -> Result<u32, RepoError> {
        self.record(RepoCall::CommitCount {
            dir: dir.to_path_buf(),
            base: base.to_string(),
        });
        Ok(*self.commit_count.lock().unwrap_or_else(|e| e.into_inner()))
    }

    async fn push(&self, dir: &Path, branch: &str) -> Result<(), RepoError> {
        self.record(RepoCall::Push {
            dir: dir.to_path_buf(),
            branch: branch.to_string(),
        });
        match self.push_error.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            Some(message) => Err(RepoError::CommandFailed(message)),
            None => Ok(()),
        }
    }

    async fn open_review(
        &self,
        dir: &Path,
        branch: &str,
        title: &str,
        _body: &str,
    ) -> Result<String, RepoError> {
        self.record(RepoCall::OpenReview {
            dir: dir.to_path_buf(),
            branch: branch.to_string(),
            title: title.to_string(),
        });
        match self
            .review_script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
        {
            Some(Ok(url)) => Ok(url),
            Some(Err(message)) => Err(RepoError::ReviewFailed(message)),
            None => Ok(format!("review/{branch}")),
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
