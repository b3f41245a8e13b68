// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry configuration: the projects drover polls and their ceilings.
//!
//! Loaded from a TOML file. The daemon re-reads it between scheduling
//! cycles only, so a cycle always runs against one immutable snapshot.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("failed to parse registry: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid registry: {0}")]
    Invalid(String),
}

/// Top-level registry: global ceiling, default poll interval, projects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Concurrency ceiling across all projects together
    #[serde(default = "default_global_ceiling")]
    pub max_workers: usize,

    /// Interval between scheduling cycles
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// Registration order here is dispatch order when slots are scarce
    #[serde(default, rename = "project")]
    pub projects: Vec<Project>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_workers: default_global_ceiling(),
            poll_interval: default_poll_interval(),
            projects: Vec::new(),
        }
    }
}

impl RegistryConfig {
    /// Load and validate a registry file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the scheduler depends on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == 0 {
            return Err(ConfigError::Invalid("max_workers must be at least 1".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid("poll_interval must be nonzero".into()));
        }
        let mut seen = HashSet::new();
        for project in &self.projects {
            if project.name.is_empty() {
                return Err(ConfigError::Invalid("project name must not be empty".into()));
            }
            if !seen.insert(project.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate project name: {}",
                    project.name
                )));
            }
            if project.max_workers == 0 {
                return Err(ConfigError::Invalid(format!(
                    "project {}: max_workers must be at least 1",
                    project.name
                )));
            }
            if project.repo.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "project {}: repo must not be empty",
                    project.name
                )));
            }
        }
        Ok(())
    }
}

/// One registered project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,

    /// Concurrency ceiling for this project alone
    #[serde(default = "default_project_ceiling")]
    pub max_workers: usize,

    /// Poll no more often than this; unset means every cycle
    #[serde(default, with = "humantime_serde")]
    pub poll_interval: Option<Duration>,

    /// Clone source for workspaces (URL or local path)
    pub repo: String,

    /// Branch workspaces start from and commits are counted against
    #[serde(default = "default_base_branch")]
    pub base_branch: String,

    /// How a finished run's result is recorded
    #[serde(default)]
    pub artifact: ArtifactMode,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(flatten)]
    pub backend: BackendConfig,
}

/// How a finished run's artifact is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactMode {
    /// Open a change request on the forge
    #[default]
    Review,
    /// Record the pushed branch itself; no forge involved
    Branch,
}

/// External agent invocation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_command")]
    pub command: String,

    /// Arguments placed before the rendered prompt
    #[serde(default = "default_agent_args")]
    pub args: Vec<String>,

    /// Wall-clock bound on one agent run, enforced by the worker
    #[serde(with = "humantime_serde", default = "default_agent_timeout")]
    pub timeout: Duration,

    /// Override for the built-in prompt template
    #[serde(default)]
    pub prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: default_agent_command(),
            args: default_agent_args(),
            timeout: default_agent_timeout(),
            prompt: None,
        }
    }
}

/// Backend-specific parameters, tagged by `backend` in the project table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Task state as labels on a forge issue tracker
    Labels {
        /// Tracker slug, e.g. "acme/api"
        tracker: String,
        #[serde(default = "default_ready_label")]
        ready_label: String,
        #[serde(default = "default_claimed_label")]
        claimed_label: String,
        #[serde(default = "default_review_label")]
        review_label: String,
    },
    /// Task state as the directory a file lives in
    Fsqueue { root: PathBuf },
    /// Task state as status rows in a shared SQLite store
    Actions {
        db: PathBuf,
        /// Key selecting this project's rows
        queue: String,
    },
}

fn default_global_ceiling() -> usize {
    4
}

fn default_project_ceiling() -> usize {
    1
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_base_branch() -> String {
    "main".to_string()
}

fn default_agent_command() -> String {
    "claude".to_string()
}

fn default_agent_args() -> Vec<String> {
    vec!["-p".to_string()]
}

fn default_agent_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_ready_label() -> String {
    "ready".to_string()
}

fn default_claimed_label() -> String {
    "in-progress".to_string()
}

fn default_review_label() -> String {
    "needs-review".to_string()
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
