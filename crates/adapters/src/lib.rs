// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O: task backends, repositories, agents

pub mod agent;
pub mod backend;
pub mod repo;
pub mod traced;

pub use agent::{tail_lines, AgentError, AgentOutcome, AgentRunner, ClaudeAgent};
pub use backend::{
    ActionBackend, AnyBackend, BackendError, FsQueueBackend, LabelBackend, LabelNames,
    TaskBackend,
};
pub use repo::{GitAdapter, RepoAdapter, RepoError};
pub use traced::{TracedRepoAdapter, TracedTaskBackend};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use agent::{AgentCall, FakeAgent};
#[cfg(any(test, feature = "test-support"))]
pub use backend::{BackendCall, FakeBackend, FakeStage};
#[cfg(any(test, feature = "test-support"))]
pub use repo::{FakeRepoAdapter, RepoCall};
