// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{branch_name, slug, Worker, WorkerDeps, WorkerSettings};
use drover_adapters::{
    BackendCall, FakeAgent, FakeBackend, FakeRepoAdapter, FakeStage, RepoCall, TaskBackend,
};
use drover_core::{
    config::{AgentConfig, BackendConfig},
    ArtifactMode, Clock, FakeClock, Project, RunStatus, SequentialIdGen, TaskId,
};
use drover_storage::RunStore;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

fn project(name: &str) -> Project {
    Project {
        name: name.to_string(),
        max_workers: 1,
        poll_interval: None,
        repo: "git@example:acme/api.git".to_string(),
        base_branch: "main".to_string(),
        artifact: ArtifactMode::Review,
        agent: AgentConfig::default(),
        backend: BackendConfig::Fsqueue {
            root: PathBuf::from("/unused"),
        },
    }
}

struct Rig {
    backend: FakeBackend,
    repo: FakeRepoAdapter,
    agent: FakeAgent,
    clock: FakeClock,
    runs: RunStore,
    project: Project,
    dir: TempDir,
}

impl Rig {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let runs = RunStore::open(&dir.path().join("runs")).unwrap();
        Self {
            backend: FakeBackend::new(),
            repo: FakeRepoAdapter::new(),
            agent: FakeAgent::new(),
            clock: FakeClock::new(),
            runs,
            project: project("api"),
            dir,
        }
    }

    fn worker(
        &self,
    ) -> Worker<FakeBackend, FakeRepoAdapter, FakeAgent, FakeClock, SequentialIdGen> {
        Worker::new(
            WorkerDeps {
                backend: self.backend.clone(),
                repo: self.repo.clone(),
                agent: self.agent.clone(),
                clock: self.clock.clone(),
                ids: SequentialIdGen::new("run"),
                runs: self.runs.clone(),
            },
            self.project.clone(),
            WorkerSettings {
                workspaces_root: self.dir.path().join("workspaces"),
                finalize_backoff: Duration::ZERO,
            },
        )
    }

    /// Seed a ready task and claim it, as the poller would have
    async fn claimed_task(&self, id: &str, title: &str, body: &str) -> TaskId {
        self.backend.push_task(id, title, body);
        let task_id = TaskId::from(id);
        self.backend.claim_task(&task_id).await.unwrap();
        task_id
    }
}

#[tokio::test]
async fn success_publishes_review_and_completes() {
    let rig = Rig::new();
    let id = rig.claimed_task("t1", "fix the build", "the CI is red").await;

    rig.worker().execute(id.clone()).await;

    let record = rig.runs.load(&id).unwrap().unwrap();
    assert_eq!(record.status, RunStatus::Done);
    assert_eq!(record.title, "fix the build");
    assert_eq!(
        record.branch_name.as_deref(),
        Some("drover/t1-fix-the-build-run-1")
    );
    assert_eq!(
        record.artifact_ref.as_deref(),
        Some("review/drover/t1-fix-the-build-run-1")
    );
    assert!(record.error.is_none());
    assert!(record.finished_at.is_some());

    assert_eq!(rig.backend.stage_of(&id), Some(FakeStage::Done));
    assert_eq!(
        rig.backend.artifact_of(&id).as_deref(),
        Some("review/drover/t1-fix-the-build-run-1")
    );

    // clone, branch, count, push, review, in that order
    let repo_calls = rig.repo.calls();
    assert_eq!(repo_calls.len(), 5);
    assert!(matches!(repo_calls[0], RepoCall::Clone { .. }));
    assert!(matches!(repo_calls[1], RepoCall::CreateBranch { .. }));
    assert!(matches!(repo_calls[2], RepoCall::CommitCount { .. }));
    assert!(matches!(repo_calls[3], RepoCall::Push { .. }));
    assert!(matches!(repo_calls[4], RepoCall::OpenReview { .. }));

    let agent_calls = rig.agent.calls();
    assert_eq!(agent_calls.len(), 1);
    assert!(agent_calls[0].prompt.contains("fix the build"));
    assert!(agent_calls[0].workspace.starts_with(rig.dir.path().join("workspaces")));
    assert!(agent_calls[0].workspace.ends_with("t1-run-1"));

    // Notices bracket the run: one at claim, one with the artifact
    assert!(rig.backend.calls().iter().any(|c| matches!(
        c,
        BackendCall::Comment { message, .. } if message.contains("starting agent run")
    )));
    assert!(rig.backend.calls().iter().any(|c| matches!(
        c,
        BackendCall::Comment { message, .. }
            if message.contains("done, artifact review/drover/t1-fix-the-build-run-1")
    )));
}

#[tokio::test]
async fn zero_commits_fails_without_pushing() {
    let rig = Rig::new();
    let id = rig.claimed_task("t1", "tweak docs", "").await;
    rig.repo.set_commit_count(0);

    rig.worker().execute(id.clone()).await;

    let record = rig.runs.load(&id).unwrap().unwrap();
    assert_eq!(record.status, RunStatus::Failed);
    assert_eq!(
        record.error.as_deref(),
        Some("agent: exited 0 but produced no committed changes")
    );

    // Requeued by the fake's default policy, error retained
    assert_eq!(rig.backend.stage_of(&id), Some(FakeStage::Ready));
    assert!(rig.backend.error_of(&id).is_some());
    assert!(!rig.repo.calls().iter().any(|c| matches!(c, RepoCall::Push { .. })));

    assert!(rig.backend.calls().iter().any(|c| matches!(
        c,
        BackendCall::Comment { message, .. } if message.contains("failed:")
    )));
}

#[tokio::test]
async fn agent_exit_failure_keeps_output_tail() {
    let rig = Rig::new();
    let id = rig.claimed_task("t1", "t", "").await;
    rig.agent.exit_with(1, "error: unresolved import");

    rig.worker().execute(id.clone()).await;

    let record = rig.runs.load(&id).unwrap().unwrap();
    assert_eq!(
        record.error.as_deref(),
        Some("agent: exited 1: error: unresolved import")
    );
    // Stops before counting commits
    assert_eq!(rig.repo.calls().len(), 2);
}

#[tokio::test]
async fn agent_timeout_is_an_agent_failure() {
    let rig = Rig::new();
    let id = rig.claimed_task("t1", "t", "").await;
    rig.agent.time_out();

    rig.worker().execute(id.clone()).await;

    let record = rig.runs.load(&id).unwrap().unwrap();
    assert_eq!(record.status, RunStatus::Failed);
    assert_eq!(record.error.as_deref(), Some("agent: timed out after 1800s"));
}

#[tokio::test]
async fn clone_failure_is_infrastructure_and_skips_the_agent() {
    let rig = Rig::new();
    let id = rig.claimed_task("t1", "t", "").await;
    rig.repo.fail_clone("no route to host");

    rig.worker().execute(id.clone()).await;

    let record = rig.runs.load(&id).unwrap().unwrap();
    assert!(record.error.as_deref().unwrap().starts_with("infrastructure:"));
    assert!(rig.agent.calls().is_empty());
    assert_eq!(rig.backend.stage_of(&id), Some(FakeStage::Ready));
}

#[tokio::test]
async fn push_failure_is_publish() {
    let rig = Rig::new();
    let id = rig.claimed_task("t1", "t", "").await;
    rig.repo.fail_push("remote rejected");

    rig.worker().execute(id.clone()).await;

    let record = rig.runs.load(&id).unwrap().unwrap();
    assert_eq!(record.error.as_deref(), Some("publish: remote rejected"));
    assert!(!rig.repo.calls().iter().any(|c| matches!(c, RepoCall::OpenReview { .. })));
}

#[tokio::test]
async fn review_failure_retries_once_and_recovers() {
    let rig = Rig::new();
    let id = rig.claimed_task("t1", "t", "").await;
    rig.repo.script_review(Err("rate limited"));
    // Second attempt falls through to the fake's default success

    rig.worker().execute(id.clone()).await;

    let record = rig.runs.load(&id).unwrap().unwrap();
    assert_eq!(record.status, RunStatus::Done);
    assert!(record.error.is_none());
    assert!(record.artifact_ref.as_deref().unwrap().starts_with("review/"));

    let reviews = rig
        .repo
        .calls()
        .iter()
        .filter(|c| matches!(c, RepoCall::OpenReview { .. }))
        .count();
    assert_eq!(reviews, 2);
}

#[tokio::test]
async fn review_failing_twice_leaves_the_branch_as_artifact() {
    let rig = Rig::new();
    let id = rig.claimed_task("t1", "fix the build", "").await;
    rig.repo.script_review(Err("forge down"));
    rig.repo.script_review(Err("forge still down"));

    rig.worker().execute(id.clone()).await;

    let record = rig.runs.load(&id).unwrap().unwrap();
    // Done, not failed: the pushed branch holds the work
    assert_eq!(record.status, RunStatus::Done);
    assert_eq!(
        record.artifact_ref.as_deref(),
        Some("drover/t1-fix-the-build-run-1")
    );
    let error = record.error.unwrap();
    assert!(error.contains("forge still down"));
    assert!(error.contains("branch pushed as drover/t1-fix-the-build-run-1"));

    assert_eq!(rig.backend.stage_of(&id), Some(FakeStage::Done));
}

#[tokio::test]
async fn branch_mode_never_opens_a_review() {
    let mut rig = Rig::new();
    rig.project.artifact = ArtifactMode::Branch;
    let id = rig.claimed_task("t1", "fix the build", "").await;

    rig.worker().execute(id.clone()).await;

    let record = rig.runs.load(&id).unwrap().unwrap();
    assert_eq!(
        record.artifact_ref.as_deref(),
        Some("drover/t1-fix-the-build-run-1")
    );
    assert!(!rig.repo.calls().iter().any(|c| matches!(c, RepoCall::OpenReview { .. })));
}

#[tokio::test]
async fn missing_task_detail_fails_as_infrastructure() {
    let rig = Rig::new();
    let id = TaskId::from("ghost");

    rig.worker().execute(id.clone()).await;

    let record = rig.runs.load(&id).unwrap().unwrap();
    assert_eq!(record.status, RunStatus::Failed);
    assert!(record
        .error
        .as_deref()
        .unwrap()
        .starts_with("infrastructure: task detail unavailable"));
    assert!(rig.repo.calls().is_empty());
}

#[tokio::test]
async fn reuses_the_record_the_poller_wrote() {
    let rig = Rig::new();
    let id = rig.claimed_task("t1", "t", "").await;

    let claimed_at = rig.clock.now();
    let existing = drover_core::RunRecord::claimed(id.clone(), "api", claimed_at);
    rig.runs.save(&existing).unwrap();
    rig.clock.advance(Duration::from_secs(90));

    rig.worker().execute(id.clone()).await;

    let record = rig.runs.load(&id).unwrap().unwrap();
    assert_eq!(record.started_at, claimed_at);
    assert_eq!(record.finished_at, Some(claimed_at + chrono::Duration::seconds(90)));
}

#[tokio::test]
async fn prompt_override_reaches_the_agent() {
    let mut rig = Rig::new();
    rig.project.agent.prompt = Some("Do exactly this: {{ title }}".to_string());
    let id = rig.claimed_task("t1", "fix the build", "").await;

    rig.worker().execute(id).await;

    assert_eq!(rig.agent.calls()[0].prompt, "Do exactly this: fix the build");
}

#[test]
fn branch_names_are_slugged_and_bounded() {
    let id = TaskId::from("42");
    assert_eq!(
        branch_name(&id, "Fix the build!", "a1b2"),
        "drover/42-fix-the-build-a1b2"
    );
    assert_eq!(branch_name(&id, "///", "a1b2"), "drover/42-a1b2");
    assert_eq!(
        branch_name(&TaskId::from("api/7"), "x", "s"),
        "drover/api-7-x-s"
    );

    let long = slug("a very long title that keeps going well past the cut");
    assert!(long.len() <= 24);
    assert!(!long.ends_with('-'));
}
