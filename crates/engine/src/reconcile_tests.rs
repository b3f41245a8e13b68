// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::orphaned_claims;
use crate::tracker::ProcessTracker;
use chrono::Utc;
use drover_core::{RunRecord, RunStatus, TaskId};
use std::time::Duration;

fn record(id: &str, status: RunStatus) -> RunRecord {
    let mut record = RunRecord::claimed(TaskId::from(id), "api", Utc::now());
    record.status = status;
    record
}

#[tokio::test]
async fn terminal_records_are_never_orphans() {
    let tracker = ProcessTracker::new();
    let records = vec![record("done", RunStatus::Done), record("failed", RunStatus::Failed)];

    assert!(orphaned_claims(&records, &tracker).is_empty());
}

#[tokio::test]
async fn in_flight_record_without_a_worker_is_an_orphan() {
    let tracker = ProcessTracker::new();
    let mut stuck = record("stuck", RunStatus::Pushing);
    stuck.branch_name = Some("drover/stuck-s1".to_string());

    let orphans = orphaned_claims(&[stuck], &tracker);
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].task_id, TaskId::from("stuck"));
    assert_eq!(orphans[0].status, RunStatus::Pushing);
    assert_eq!(orphans[0].branch_name.as_deref(), Some("drover/stuck-s1"));
}

#[tokio::test]
async fn a_live_worker_clears_the_suspicion() {
    let mut tracker = ProcessTracker::new();
    tracker
        .register(
            TaskId::from("running"),
            "api",
            Utc::now(),
            tokio::spawn(std::future::pending::<()>()),
        )
        .unwrap();

    let records = vec![record("running", RunStatus::Running), record("stuck", RunStatus::Claimed)];
    let orphans = orphaned_claims(&records, &tracker);
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].task_id, TaskId::from("stuck"));

    tracker.abort_all();
}

#[tokio::test]
async fn a_finished_but_unreaped_worker_is_already_an_orphan() {
    let mut tracker = ProcessTracker::new();
    tracker
        .register(
            TaskId::from("t1"),
            "api",
            Utc::now(),
            tokio::spawn(async {}),
        )
        .unwrap();
    for _ in 0..400 {
        if !tracker.is_active(&TaskId::from("t1")) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // The worker ended without finishing its record: that is exactly the
    // orphan case, reaped or not
    let orphans = orphaned_claims(&[record("t1", RunStatus::Running)], &tracker);
    assert_eq!(orphans.len(), 1);
}
