// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the fake repo adapter

use super::*;
use std::path::PathBuf;

#[tokio::test]
async fn records_calls_in_order() {
    let repo = FakeRepoAdapter::new();
    let dir = PathBuf::from("/ws/t1");

    repo.clone_repo("src.git", &dir, "main").await.unwrap();
    repo.create_branch(&dir, "drover/t1-x").await.unwrap();
    repo.push(&dir, "drover/t1-x").await.unwrap();

    let calls = repo.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(
        calls[0],
        RepoCall::Clone {
            source: "src.git".to_string(),
            dest: dir.clone(),
            base: "main".to_string(),
        }
    );
    assert!(matches!(calls[2], RepoCall::Push { .. }));
}

#[tokio::test]
async fn commit_count_is_configurable() {
    let repo = FakeRepoAdapter::new();
    let dir = PathBuf::from("/ws");
    assert_eq!(repo.commit_count(&dir, "main").await.unwrap(), 1);
    repo.set_commit_count(0);
    assert_eq!(repo.commit_count(&dir, "main").await.unwrap(), 0);
}

#[tokio::test]
async fn review_script_is_consumed_in_order() {
    let repo = FakeRepoAdapter::new();
    let dir = PathBuf::from("/ws");
    repo.script_review(Err("rate limited"));
    repo.script_review(Ok("https://forge/pr/7"));

    assert!(repo.open_review(&dir, "b", "t", "").await.is_err());
    assert_eq!(
        repo.open_review(&dir, "b", "t", "").await.unwrap(),
        "https://forge/pr/7"
    );
    // script exhausted: default success
    assert_eq!(repo.open_review(&dir, "b", "t", "").await.unwrap(), "review/b");
}

#[tokio::test]
async fn scripted_failures_fire() {
    let repo = FakeRepoAdapter::new();
    let dir = PathBuf::from("/ws");
    repo.fail_clone("no such repo");
    repo.fail_push("remote rejected");

    assert!(matches!(
        repo.clone_repo("x", &dir, "main").await,
        Err(RepoError::CloneFailed(_))
    ));
    assert!(matches!(
        repo.push(&dir, "b").await,
        Err(RepoError::CommandFailed(_))
    ));
}
