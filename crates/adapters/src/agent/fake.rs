// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake agent runner for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use async_trait::async_trait;
use drover_core::config::AgentConfig;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use super::{AgentError, AgentOutcome, AgentRunner};

/// Recorded agent invocation
#[derive(Debug, Clone, PartialEq)]
pub struct AgentCall {
    pub workspace: PathBuf,
    pub prompt: String,
}

#[derive(Debug, Clone)]
enum ScriptedRun {
    Exit { code: i32, tail: String },
    TimeOut,
    /// Hold the worker until a release permit arrives
    Block,
}

/// Scriptable agent. An exhausted script means immediate success, so
/// simple tests need no setup.
#[derive(Clone)]
pub struct FakeAgent {
    calls: Arc<Mutex<Vec<AgentCall>>>,
    script: Arc<Mutex<VecDeque<ScriptedRun>>>,
    release: Arc<Semaphore>,
}

impl Default for FakeAgent {
    fn default() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            script: Arc::new(Mutex::new(VecDeque::new())),
            release: Arc::new(Semaphore::new(0)),
        }
    }
}

impl FakeAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<AgentCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Script the next run to exit with this code and output tail
    pub fn exit_with(&self, code: i32, tail: &str) {
        self.push(ScriptedRun::Exit {
            code,
            tail: tail.to_string(),
        });
    }

    /// Script the next run to hit the configured timeout
    pub fn time_out(&self) {
        self.push(ScriptedRun::TimeOut);
    }

    /// Script the next run to block until `release_one` is called.
    /// Lets tests hold worker slots occupied across scheduling cycles.
    pub fn block(&self) {
        self.push(ScriptedRun::Block);
    }

    /// Let one blocked run finish successfully
    pub fn release_one(&self) {
        self.release.add_permits(1);
    }

    fn push(&self, run: ScriptedRun) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(run);
    }
}

#[async_trait]
impl AgentRunner for FakeAgent {
    async fn run(
        &self,
        workspace: &Path,
        prompt: &str,
        config: &AgentConfig,
    ) -> Result<AgentOutcome, AgentError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(AgentCall {
                workspace: workspace.to_path_buf(),
                prompt: prompt.to_string(),
            });

        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        match next {
            None => Ok(AgentOutcome {
                exit_code: 0,
                tail: String::new(),
            }),
            Some(ScriptedRun::Exit { code, tail }) => Ok(AgentOutcome {
                exit_code: code,
                tail,
            }),
            Some(ScriptedRun::TimeOut) => Err(AgentError::TimedOut(config.timeout)),
            Some(ScriptedRun::Block) => {
                let permit = self
                    .release
                    .acquire()
                    .await
                    .map_err(|_| AgentError::SpawnFailed("release semaphore closed".to_string()))?;
                permit.forget();
                Ok(AgentOutcome {
                    exit_code: 0,
                    tail: String::new(),
                })
            }
        }
    }
}
