// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent adapters: running the external coding agent in a workspace

mod claude;

pub use claude::ClaudeAgent;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{AgentCall, FakeAgent};

use async_trait::async_trait;
use drover_core::config::AgentConfig;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// What an agent run produced
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutcome {
    pub exit_code: i32,
    /// Last lines of combined output, kept for failure context
    pub tail: String,
}

impl AgentOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Errors from agent invocation
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error("failed to spawn agent: {0}")]
    SpawnFailed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Adapter for invoking the external coding agent.
///
/// The caller owns the timeout: implementations must return within the
/// configured bound whether or not the agent cooperates.
#[async_trait]
pub trait AgentRunner: Clone + Send + Sync + 'static {
    async fn run(
        &self,
        workspace: &Path,
        prompt: &str,
        config: &AgentConfig,
    ) -> Result<AgentOutcome, AgentError>;
}

/// Last `n` lines of a process's combined output
pub fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_lines_keeps_last_n() {
        assert_eq!(tail_lines("a\nb\nc\nd", 2), "c\nd");
        assert_eq!(tail_lines("a\nb", 5), "a\nb");
        assert_eq!(tail_lines("", 3), "");
    }

    #[test]
    fn outcome_success_is_exit_zero() {
        assert!(AgentOutcome { exit_code: 0, tail: String::new() }.success());
        assert!(!AgentOutcome { exit_code: 2, tail: String::new() }.success());
    }

    #[test]
    fn timeout_error_reports_seconds() {
        let err = AgentError::TimedOut(Duration::from_secs(1800));
        assert_eq!(err.to_string(), "agent timed out after 1800s");
    }
}
