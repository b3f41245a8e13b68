// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::RunStore;
use drover_core::{Clock, RunRecord, RunStatus, SystemClock, TaskId};
use tempfile::TempDir;

fn store() -> (TempDir, RunStore) {
    let dir = TempDir::new().unwrap();
    let store = RunStore::open(dir.path()).unwrap();
    (dir, store)
}

fn record(id: &str) -> RunRecord {
    RunRecord::claimed(TaskId::from(id), "api", SystemClock.now())
}

#[test]
fn load_missing_is_none() {
    let (_dir, store) = store();
    assert!(store.load(&TaskId::from("nope")).unwrap().is_none());
}

#[test]
fn save_then_load_round_trips() {
    let (_dir, store) = store();
    let mut rec = record("t1");
    rec.title = "fix the build".to_string();
    rec.branch_name = Some("drover/t1-fix-a1b2".to_string());
    store.save(&rec).unwrap();

    let loaded = store.load(&TaskId::from("t1")).unwrap().unwrap();
    assert_eq!(loaded, rec);
}

#[test]
fn save_overwrites_in_place() {
    let (dir, store) = store();
    let mut rec = record("t1");
    store.save(&rec).unwrap();

    rec.status = RunStatus::Running;
    store.save(&rec).unwrap();
    rec.finish_failed("agent: exited 1", SystemClock.now());
    store.save(&rec).unwrap();

    // Still one file: the record replaces itself rather than accumulating
    let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(files.len(), 1);

    let loaded = store.load(&TaskId::from("t1")).unwrap().unwrap();
    assert_eq!(loaded.status, RunStatus::Failed);
    assert_eq!(loaded.error.as_deref(), Some("agent: exited 1"));
}

#[test]
fn list_sorts_by_task_id() {
    let (_dir, store) = store();
    for id in ["charlie", "alpha", "bravo"] {
        store.save(&record(id)).unwrap();
    }

    let ids: Vec<String> = store
        .list()
        .unwrap()
        .into_iter()
        .map(|r| r.task_id.0)
        .collect();
    assert_eq!(ids, vec!["alpha", "bravo", "charlie"]);
}

#[test]
fn list_skips_corrupt_records() {
    let (dir, store) = store();
    store.save(&record("good")).unwrap();
    std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();

    let records = store.list().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].task_id.0, "good");
}

#[test]
fn list_ignores_other_files() {
    let (dir, store) = store();
    store.save(&record("t1")).unwrap();
    std::fs::write(dir.path().join("README.txt"), "not a record").unwrap();

    assert_eq!(store.list().unwrap().len(), 1);
}

#[test]
fn delete_is_repeat_safe() {
    let (_dir, store) = store();
    store.save(&record("t1")).unwrap();

    store.delete(&TaskId::from("t1")).unwrap();
    store.delete(&TaskId::from("t1")).unwrap();
    assert!(store.load(&TaskId::from("t1")).unwrap().is_none());
}

#[test]
fn awkward_ids_get_safe_filenames() {
    let (_dir, store) = store();
    let id = TaskId::from("api/task:1");
    let rec = RunRecord::claimed(id.clone(), "api", SystemClock.now());
    store.save(&rec).unwrap();

    let path = store.path_for(&id);
    assert_eq!(
        path.file_name().and_then(|n| n.to_str()),
        Some("api-task-1.json")
    );
    assert_eq!(store.load(&id).unwrap().unwrap().task_id, id);
}
