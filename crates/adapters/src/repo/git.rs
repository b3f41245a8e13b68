// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git adapter shelling out to `git` and `gh`

use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

use super::{RepoAdapter, RepoError};

/// Runs git operations via the git CLI
#[derive(Clone, Default)]
pub struct GitAdapter;

impl GitAdapter {
    pub fn new() -> Self {
        Self
    }

    async fn git(dir: &Path, args: &[&str]) -> Result<String, RepoError> {
        let output = Command::new("git")
            .current_dir(dir)
            .args(args)
            .output()
            .await
            .map_err(|e| RepoError::CommandFailed(e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(RepoError::CommandFailed(stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl RepoAdapter for GitAdapter {
    async fn clone_repo(&self, source: &str, dest: &Path, base: &str) -> Result<(), RepoError> {
        let output = Command::new("git")
            .arg("clone")
            .arg("--branch")
            .arg(base)
            .arg("--")
            .arg(source)
            .arg(dest)
            .output()
            .await
            .map_err(|e| RepoError::CloneFailed(e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(RepoError::CloneFailed(stderr));
        }
        Ok(())
    }

    async fn create_branch(&self, dir: &Path, name: &str) -> Result<(), RepoError> {
        match Self::git(dir, &["checkout", "-b", name]).await {
            Ok(_) => Ok(()),
            Err(RepoError::CommandFailed(stderr)) if stderr.contains("already exists") => {
                Err(RepoError::BranchExists(name.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn commit_count(&self, dir: &Path, base: &str) -> Result<u32, RepoError> {
        let range = format!("{base}..HEAD");
        let stdout = Self::git(dir, &["rev-list", "--count", &range]).await?;
        stdout
            .trim()
            .parse::<u32>()
            .map_err(|e| RepoError::CommandFailed(format!("rev-list output: {e}")))
    }

    async fn push(&self, dir: &Path, branch: &str) -> Result<(), RepoError> {
        Self::git(dir, &["push", "--set-upstream", "origin", branch])
            .await
            .map(|_| ())
    }

    async fn open_review(
        &self,
        dir: &Path,
        branch: &str,
        title: &str,
        body: &str,
    ) -> Result<String, RepoError> {
        let output = Command::new("gh")
            .current_dir(dir)
            .args(["pr", "create", "--head", branch, "--title", title, "--body", body])
            .output()
            .await
            .map_err(|e| RepoError::ReviewFailed(e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(RepoError::ReviewFailed(stderr));
        }
        // gh prints the new request's URL as the last line of stdout
        let stdout = String::from_utf8_lossy(&output.stdout);
        let url = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
            .to_string();
        if url.is_empty() {
            return Err(RepoError::ReviewFailed("no url in gh output".to_string()));
        }
        Ok(url)
    }
}
