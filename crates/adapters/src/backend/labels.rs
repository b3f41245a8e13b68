// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Label-state backend: task state encoded as labels on tracker issues.
//!
//! Issues move through the ready → claimed → review labels. The tracker
//! applies label edits one call at a time, so a claim is two remote calls
//! and another claimant can observe the issue between them. That window is
//! an accepted property of this store; the stage check before the edits
//! narrows it but cannot close it.

use async_trait::async_trait;
use drover_core::{Task, TaskId, TaskStage, Transition};
use serde::Deserialize;
use tokio::process::Command;

use super::{BackendError, TaskBackend};

/// Label names encoding each lifecycle stage
#[derive(Debug, Clone)]
pub struct LabelNames {
    pub ready: String,
    pub claimed: String,
    pub review: String,
}

impl LabelNames {
    /// Highest stage named by a set of issue labels. An issue carrying both
    /// the ready and claimed labels mid-edit counts as claimed.
    pub fn stage_of(&self, labels: &[String]) -> Option<TaskStage> {
        let mut stage = None;
        for label in labels {
            let found = if *label == self.review {
                Some(TaskStage::Review)
            } else if *label == self.claimed {
                Some(TaskStage::Claimed)
            } else if *label == self.ready {
                Some(TaskStage::Ready)
            } else {
                None
            };
            if found > stage {
                stage = found;
            }
        }
        stage
    }
}

#[derive(Debug, Deserialize)]
struct IssueRef {
    number: u64,
}

#[derive(Debug, Deserialize)]
struct IssueDetail {
    number: u64,
    title: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    labels: Vec<IssueLabel>,
}

#[derive(Debug, Deserialize)]
struct IssueLabel {
    name: String,
}

impl IssueDetail {
    fn label_names(&self) -> Vec<String> {
        self.labels.iter().map(|l| l.name.clone()).collect()
    }
}

/// Parse `gh issue list --json number` output into task ids
fn parse_issue_list(json: &str) -> Result<Vec<TaskId>, BackendError> {
    let refs: Vec<IssueRef> = serde_json::from_str(json)
        .map_err(|e| BackendError::Store(format!("issue list parse: {e}")))?;
    Ok(refs
        .into_iter()
        .map(|r| TaskId(r.number.to_string()))
        .collect())
}

/// Issue tracker backend driven through the `gh` CLI
#[derive(Clone)]
pub struct LabelBackend {
    tracker: String,
    labels: LabelNames,
}

impl LabelBackend {
    pub fn new(tracker: String, labels: LabelNames) -> Self {
        Self { tracker, labels }
    }

    async fn gh(&self, args: &[&str]) -> Result<String, BackendError> {
        let output = Command::new("gh").args(args).output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(BackendError::CommandFailed(stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn view(&self, id: &TaskId) -> Result<IssueDetail, BackendError> {
        let json = self
            .gh(&[
                "issue",
                "view",
                &id.0,
                "-R",
                &self.tracker,
                "--json",
                "number,title,body,labels",
            ])
            .await
            .map_err(|e| match e {
                BackendError::CommandFailed(msg)
                    if msg.contains("not find") || msg.contains("not found") =>
                {
                    BackendError::NotFound(id.clone())
                }
                other => other,
            })?;
        serde_json::from_str(&json)
            .map_err(|e| BackendError::Store(format!("issue view parse: {e}")))
    }

    async fn edit(&self, id: &TaskId, flag: &str, label: &str) -> Result<(), BackendError> {
        self.gh(&["issue", "edit", &id.0, "-R", &self.tracker, flag, label])
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl TaskBackend for LabelBackend {
    async fn list_ready_tasks(&self) -> Result<Vec<TaskId>, BackendError> {
        let json = self
            .gh(&[
                "issue",
                "list",
                "-R",
                &self.tracker,
                "--state",
                "open",
                "--label",
                &self.labels.ready,
                "--json",
                "number",
                "--limit",
                "100",
            ])
            .await?;
        parse_issue_list(&json)
    }

    async fn claim_task(&self, id: &TaskId) -> Result<(), BackendError> {
        let detail = self.view(id).await?;
        match self.labels.stage_of(&detail.label_names()) {
            Some(stage) if stage.claimable() => {}
            _ => return Err(BackendError::NotReady(id.clone())),
        }

        // Two remote calls; the tracker offers no way to make them one.
        // Add first so the issue is never label-less mid-claim.
        self.edit(id, "--add-label", &self.labels.claimed).await?;
        self.edit(id, "--remove-label", &self.labels.ready).await?;
        Ok(())
    }

    async fn get_task(&self, id: &TaskId) -> Result<Task, BackendError> {
        let detail = self.view(id).await?;
        Ok(Task {
            id: id.clone(),
            title: detail.title,
            body: detail.body,
            backend_ref: format!("{}#{}", self.tracker, detail.number),
            // Failures live in issue comments, not a dedicated field
            error: None,
        })
    }

    async fn complete_task(&self, id: &TaskId, artifact: &str) -> Result<(), BackendError> {
        let detail = self.view(id).await?;
        if let Some(current) = self.labels.stage_of(&detail.label_names()) {
            match current.validate(TaskStage::Review) {
                Transition::Apply => {}
                Transition::Noop => return Ok(()),
                Transition::Regression => {
                    return Err(BackendError::Stale {
                        id: id.clone(),
                        stage: current.to_string(),
                    })
                }
            }
        }

        self.edit(id, "--add-label", &self.labels.review).await?;
        self.edit(id, "--remove-label", &self.labels.claimed).await?;
        if let Err(e) = self
            .comment(id, &format!("drover: task complete, artifact {artifact}"))
            .await
        {
            tracing::warn!(task_id = %id, error = %e, "result notice failed");
        }
        Ok(())
    }

    async fn fail_task(&self, id: &TaskId, error: &str) -> Result<(), BackendError> {
        let detail = self.view(id).await?;
        match self.labels.stage_of(&detail.label_names()) {
            Some(TaskStage::Review) => {
                return Err(BackendError::Stale {
                    id: id.clone(),
                    stage: TaskStage::Review.to_string(),
                })
            }
            Some(TaskStage::Claimed) => {
                self.edit(id, "--remove-label", &self.labels.claimed).await?;
            }
            // Already off the claimed stage; record the error only
            _ => {}
        }

        // No automatic requeue for this store: a human re-adds the ready
        // label after reading the error, so every label move stays forward.
        self.comment(id, &format!("drover: task failed: {error}"))
            .await
    }

    async fn comment(&self, id: &TaskId, message: &str) -> Result<(), BackendError> {
        self.gh(&[
            "issue",
            "comment",
            &id.0,
            "-R",
            &self.tracker,
            "--body",
            message,
        ])
        .await
        .map(|_| ())
    }
}

#[cfg(test)]
#[path = "labels_tests.rs"]
mod tests;
