// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for the fake backend

use super::*;

#[tokio::test]
async fn lifecycle_and_call_recording() {
    let backend = FakeBackend::new();
    backend.push_task("t1", "title", "body");
    let id = TaskId::from("t1");

    assert_eq!(backend.list_ready_tasks().await.unwrap(), vec![id.clone()]);
    backend.claim_task(&id).await.unwrap();
    assert!(backend.list_ready_tasks().await.unwrap().is_empty());
    backend.complete_task(&id, "review/1").await.unwrap();

    assert_eq!(backend.stage_of(&id), Some(FakeStage::Done));
    assert_eq!(backend.artifact_of(&id).as_deref(), Some("review/1"));

    let calls = backend.calls();
    assert!(matches!(calls[0], BackendCall::ListReady));
    assert!(matches!(calls[1], BackendCall::Claim(_)));
}

#[tokio::test]
async fn second_claim_loses() {
    let backend = FakeBackend::new();
    backend.push_task("t1", "t", "b");
    let id = TaskId::from("t1");

    backend.claim_task(&id).await.unwrap();
    let err = backend.claim_task(&id).await.unwrap_err();
    assert!(matches!(err, BackendError::NotReady(_)));
}

#[tokio::test]
async fn denied_claim_keeps_task_ready() {
    let backend = FakeBackend::new();
    backend.push_task("t1", "t", "b");
    backend.deny_claim("t1");
    let id = TaskId::from("t1");

    let err = backend.claim_task(&id).await.unwrap_err();
    assert!(matches!(err, BackendError::NotReady(_)));
    assert_eq!(backend.stage_of(&id), Some(FakeStage::Ready));
}

#[tokio::test]
async fn fail_requeues_by_default_and_parks_when_told() {
    let backend = FakeBackend::new();
    backend.push_task("t1", "t", "b");
    let id = TaskId::from("t1");
    backend.claim_task(&id).await.unwrap();
    backend.fail_task(&id, "boom").await.unwrap();
    assert_eq!(backend.stage_of(&id), Some(FakeStage::Ready));
    assert_eq!(backend.error_of(&id).as_deref(), Some("boom"));

    let parked = FakeBackend::new();
    parked.push_task("t2", "t", "b");
    parked.park_failures();
    let id = TaskId::from("t2");
    parked.claim_task(&id).await.unwrap();
    parked.fail_task(&id, "boom").await.unwrap();
    assert_eq!(parked.stage_of(&id), Some(FakeStage::Failed));
    assert!(parked.list_ready_tasks().await.unwrap().is_empty());
}

#[tokio::test]
async fn scripted_list_error_fires_once() {
    let backend = FakeBackend::new();
    backend.push_task("t1", "t", "b");
    backend.fail_next_list("tracker down");

    assert!(backend.list_ready_tasks().await.is_err());
    assert_eq!(backend.list_ready_tasks().await.unwrap().len(), 1);
}

#[tokio::test]
async fn stale_listing_includes_claimed_tasks() {
    let backend = FakeBackend::new();
    backend.push_task("t1", "t", "b");
    backend.serve_stale_listings();
    let id = TaskId::from("t1");

    backend.claim_task(&id).await.unwrap();
    assert_eq!(backend.list_ready_tasks().await.unwrap(), vec![id]);
}
