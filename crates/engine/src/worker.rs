// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker: one claimed task, driven from clone to published artifact.
//!
//! A worker owns its task end to end and reconciles its own outcome with
//! the task's backend before returning. The poller never inspects worker
//! results; it learns about completion when the join handle finishes.

use std::path::PathBuf;
use std::time::Duration;

use drover_adapters::{AgentError, AgentRunner, RepoAdapter, TaskBackend};
use drover_core::{
    render_agent_prompt, ArtifactMode, Clock, IdGen, Project, RunRecord, RunStatus, Task, TaskId,
};
use drover_storage::RunStore;

/// Worker dependencies
pub struct WorkerDeps<B, R, A, C, I> {
    pub backend: B,
    pub repo: R,
    pub agent: A,
    pub clock: C,
    pub ids: I,
    pub runs: RunStore,
}

/// Worker path and timing configuration
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Directory that holds per-run workspaces
    pub workspaces_root: PathBuf,
    /// Pause before retrying a failed review creation
    pub finalize_backoff: Duration,
}

/// Which stage failed, for error prefixes and requeue reporting
enum StageFailure {
    /// Environment problems: clone, prompt, record plumbing
    Infra(String),
    /// The agent ran and did not produce usable work
    Agent(String),
    /// The work exists but could not be published
    Publish(String),
}

impl StageFailure {
    fn describe(&self) -> String {
        match self {
            StageFailure::Infra(m) => format!("infrastructure: {m}"),
            StageFailure::Agent(m) => format!("agent: {m}"),
            StageFailure::Publish(m) => format!("publish: {m}"),
        }
    }
}

/// Executes one claimed task
pub struct Worker<B, R, A, C, I> {
    deps: WorkerDeps<B, R, A, C, I>,
    project: Project,
    settings: WorkerSettings,
}

impl<B, R, A, C, I> Worker<B, R, A, C, I>
where
    B: TaskBackend,
    R: RepoAdapter,
    A: AgentRunner,
    C: Clock,
    I: IdGen,
{
    pub fn new(
        deps: WorkerDeps<B, R, A, C, I>,
        project: Project,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            deps,
            project,
            settings,
        }
    }

    /// Run the task to a terminal state and reconcile with the backend.
    ///
    /// Never returns an error: every failure ends in `fail_task` plus a
    /// failed run record, so the claim is accounted for even when the
    /// caller only sees the join handle finish.
    pub async fn execute(self, task_id: TaskId) {
        tracing::info!(task_id = %task_id, project = %self.project.name, "worker starting");

        let now = self.deps.clock.now();
        let mut record = match self.deps.runs.load(&task_id) {
            Ok(Some(record)) => record,
            Ok(None) => RunRecord::claimed(task_id.clone(), &self.project.name, now),
            Err(e) => {
                tracing::warn!(
                    task_id = %task_id,
                    error = %e,
                    "run record unreadable, starting fresh"
                );
                RunRecord::claimed(task_id.clone(), &self.project.name, now)
            }
        };

        match self.run_stages(&task_id, &mut record).await {
            Ok(artifact) => {
                record.finish_done(Some(artifact.clone()), self.deps.clock.now());
                if let Err(e) = self.deps.backend.complete_task(&task_id, &artifact).await {
                    // The work is published; a refusing store only loses the notice
                    tracing::warn!(task_id = %task_id, error = %e, "complete_task refused");
                }
                self.notify(&task_id, &format!("drover: done, artifact {artifact}"))
                    .await;
                tracing::info!(task_id = %task_id, artifact = %artifact, "worker finished");
            }
            Err(failure) => {
                let description = failure.describe();
                record.finish_failed(description.clone(), self.deps.clock.now());
                if let Err(e) = self.deps.backend.fail_task(&task_id, &description).await {
                    tracing::warn!(task_id = %task_id, error = %e, "fail_task refused");
                }
                self.notify(&task_id, &format!("drover: failed: {description}"))
                    .await;
                tracing::info!(task_id = %task_id, error = %description, "worker failed");
            }
        }

        self.persist(&record);
    }

    async fn run_stages(
        &self,
        task_id: &TaskId,
        record: &mut RunRecord,
    ) -> Result<String, StageFailure> {
        // Detail first: the claim carried only the id
        let task = self
            .deps
            .backend
            .get_task(task_id)
            .await
            .map_err(|e| StageFailure::Infra(format!("task detail unavailable: {e}")))?;
        record.title = task.title.clone();
        record.status = RunStatus::Running;
        self.persist(record);

        self.notify(task_id, "drover: claimed, starting agent run")
            .await;

        let suffix = self.deps.ids.short();
        let safe = safe_id(&task_id.0);
        let workspace = self.settings.workspaces_root.join(format!("{safe}-{suffix}"));
        let branch = branch_name(task_id, &task.title, &suffix);

        std::fs::create_dir_all(&self.settings.workspaces_root)
            .map_err(|e| StageFailure::Infra(format!("workspace root: {e}")))?;

        self.deps
            .repo
            .clone_repo(&self.project.repo, &workspace, &self.project.base_branch)
            .await
            .map_err(|e| StageFailure::Infra(e.to_string()))?;
        self.deps
            .repo
            .create_branch(&workspace, &branch)
            .await
            .map_err(|e| StageFailure::Infra(e.to_string()))?;

        record.branch_name = Some(branch.clone());
        self.persist(record);

        let prompt = render_agent_prompt(self.project.agent.prompt.as_deref(), &task)
            .map_err(|e| StageFailure::Infra(e.to_string()))?;

        let outcome = match self.deps.agent.run(&workspace, &prompt, &self.project.agent).await {
            Ok(outcome) => outcome,
            Err(AgentError::TimedOut(limit)) => {
                return Err(StageFailure::Agent(format!(
                    "timed out after {}s",
                    limit.as_secs()
                )));
            }
            Err(e) => return Err(StageFailure::Infra(e.to_string())),
        };
        if !outcome.success() {
            return Err(StageFailure::Agent(format!(
                "exited {}: {}",
                outcome.exit_code, outcome.tail
            )));
        }

        let commits = self
            .deps
            .repo
            .commit_count(&workspace, &self.project.base_branch)
            .await
            .map_err(|e| StageFailure::Infra(e.to_string()))?;
        if commits == 0 {
            // Exit 0 with nothing committed is not success
            return Err(StageFailure::Agent(
                "exited 0 but produced no committed changes".to_string(),
            ));
        }

        record.status = RunStatus::Pushing;
        self.persist(record);

        self.deps
            .repo
            .push(&workspace, &branch)
            .await
            .map_err(|e| StageFailure::Publish(e.to_string()))?;

        let artifact = self.publish(record, &workspace, &branch, &task).await;

        // Success leaves no workspace behind; failures keep theirs for
        // inspection
        if let Err(e) = std::fs::remove_dir_all(&workspace) {
            tracing::warn!(
                workspace = %workspace.display(),
                error = %e,
                "workspace cleanup failed"
            );
        }

        Ok(artifact)
    }

    /// Turn the pushed branch into the project's artifact.
    ///
    /// In review mode a failed review creation is retried once after a
    /// backoff; if it fails again the branch itself becomes the artifact
    /// and the record keeps the review error. The push already landed, so
    /// the work is never lost to a flaky review endpoint.
    async fn publish(
        &self,
        record: &mut RunRecord,
        workspace: &std::path::Path,
        branch: &str,
        task: &Task,
    ) -> String {
        match self.project.artifact {
            ArtifactMode::Branch => branch.to_string(),
            ArtifactMode::Review => {
                let body = review_body(task);
                let first = match self
                    .deps
                    .repo
                    .open_review(workspace, branch, &task.title, &body)
                    .await
                {
                    Ok(url) => return url,
                    Err(e) => e,
                };

                record.error = Some(format!("review not opened: {first}"));
                self.persist(record);
                tokio::time::sleep(self.settings.finalize_backoff).await;

                match self
                    .deps
                    .repo
                    .open_review(workspace, branch, &task.title, &body)
                    .await
                {
                    Ok(url) => {
                        record.error = None;
                        url
                    }
                    Err(second) => {
                        record.error = Some(format!(
                            "review not opened: {second}; branch pushed as {branch}"
                        ));
                        branch.to_string()
                    }
                }
            }
        }
    }

    /// Best-effort notice; a store that cannot take comments loses nothing
    async fn notify(&self, task_id: &TaskId, message: &str) {
        if let Err(e) = self.deps.backend.comment(task_id, message).await {
            tracing::debug!(task_id = %task_id, error = %e, "progress notice not delivered");
        }
    }

    /// Records are observability, not control flow; a failed save is
    /// logged and the run continues
    fn persist(&self, record: &RunRecord) {
        if let Err(e) = self.deps.runs.save(record) {
            tracing::warn!(task_id = %record.task_id, error = %e, "run record save failed");
        }
    }
}

/// Branch name for a run: `drover/<id>-<slug>-<suffix>`.
///
/// The slug is a lowercased, truncated cut of the title so a branch listing
/// reads like a task list. The random suffix keeps reruns of the same task
/// from colliding.
fn branch_name(task_id: &TaskId, title: &str, suffix: &str) -> String {
    let id = safe_id(&task_id.0);
    let slug = slug(title);
    if slug.is_empty() {
        format!("drover/{id}-{suffix}")
    } else {
        format!("drover/{id}-{slug}-{suffix}")
    }
}

fn slug(title: &str) -> String {
    let cleaned: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();
    let mut slug = cleaned.split_whitespace().collect::<Vec<_>>().join("-");
    // All ASCII at this point, so a byte cut is a char cut
    slug.truncate(24);
    slug.trim_end_matches('-').to_string()
}

/// Task ids come from external stores; keep only filename- and
/// branch-safe characters
fn safe_id(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

fn review_body(task: &Task) -> String {
    if task.body.is_empty() {
        format!("Automated change for task {}.", task.id)
    } else {
        format!("{}\n\nAutomated change for task {}.", task.body, task.id)
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
