//! Agent runner shelling out to the configured agent CLI

use async_trait::async_trait;
use drover_core::config::AgentConfig;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use super::{tail_lines, AgentError, AgentOutcome, AgentRunner};

const TAIL_LINES: usize = 40;

/// Runs the agent as a child process inside the workspace
#[derive(Clone, Default)]
pub struct ClaudeAgent;

impl ClaudeAgent {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AgentRunner for ClaudeAgent {
    async fn run(
        &self,
        workspace: &Path,
        prompt: &str,
        config: &AgentConfig,
    ) -> Result<AgentOutcome, AgentError> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .arg(prompt)
            .current_dir(workspace)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the wait future on timeout must take the child with it
            .kill_on_drop(true);

        let started = std::time::Instant::now();
        tracing::info!(
            command = %config.command,
            workspace = %workspace.display(),
            "starting agent"
        );

        let child = cmd
            .spawn()
            .map_err(|e| AgentError::SpawnFailed(e.to_string()))?;

        let output = match tokio::time::timeout(config.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "agent timed out"
                );
                return Err(AgentError::TimedOut(config.timeout));
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.stderr.is_empty() {
            combined.push('\n');
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
        }
        let outcome = AgentOutcome {
            exit_code: output.status.code().unwrap_or(-1),
            tail: tail_lines(&combined, TAIL_LINES),
        };
        tracing::info!(
            exit_code = outcome.exit_code,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "agent finished"
        );
        Ok(outcome)
    }
}
