// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for task stages and the transition gate

use super::*;
use proptest::prelude::*;
use yare::parameterized;

#[parameterized(
    ready_to_claimed = { TaskStage::Ready, TaskStage::Claimed, Transition::Apply },
    claimed_to_review = { TaskStage::Claimed, TaskStage::Review, Transition::Apply },
    ready_to_review = { TaskStage::Ready, TaskStage::Review, Transition::Apply },
    repeat_ready = { TaskStage::Ready, TaskStage::Ready, Transition::Noop },
    repeat_claim = { TaskStage::Claimed, TaskStage::Claimed, Transition::Noop },
    repeat_review = { TaskStage::Review, TaskStage::Review, Transition::Noop },
    review_back_to_claimed = { TaskStage::Review, TaskStage::Claimed, Transition::Regression },
    claimed_back_to_ready = { TaskStage::Claimed, TaskStage::Ready, Transition::Regression },
    review_back_to_ready = { TaskStage::Review, TaskStage::Ready, Transition::Regression },
)]
fn stage_gate(current: TaskStage, target: TaskStage, expected: Transition) {
    assert_eq!(current.validate(target), expected);
}

#[test]
fn only_ready_is_claimable() {
    assert!(TaskStage::Ready.claimable());
    assert!(!TaskStage::Claimed.claimable());
    assert!(!TaskStage::Review.claimable());
}

#[test]
fn stage_ordering_is_lifecycle_order() {
    // The gate depends on this ordering; a reordered enum must fail here.
    assert!(TaskStage::Ready < TaskStage::Claimed);
    assert!(TaskStage::Claimed < TaskStage::Review);
}

#[test]
fn stage_serializes_as_snake_case() {
    let json = serde_json::to_string(&TaskStage::Claimed).unwrap();
    assert_eq!(json, "\"claimed\"");
    let parsed: TaskStage = serde_json::from_str("\"review\"").unwrap();
    assert_eq!(parsed, TaskStage::Review);
}

#[test]
fn task_id_display_matches_inner() {
    let id = TaskId::from("api-42");
    assert_eq!(id.to_string(), "api-42");
    assert_eq!(TaskId::from("api-42".to_string()), id);
}

fn stage_strategy() -> impl Strategy<Value = TaskStage> {
    prop_oneof![
        Just(TaskStage::Ready),
        Just(TaskStage::Claimed),
        Just(TaskStage::Review),
    ]
}

proptest! {
    /// Applying the gate's verdict never yields an earlier stage than the
    /// one the task is already at.
    #[test]
    fn gate_is_monotonic(current in stage_strategy(), target in stage_strategy()) {
        let after = match current.validate(target) {
            Transition::Apply => target,
            Transition::Noop | Transition::Regression => current,
        };
        prop_assert!(after >= current);
    }

    /// The gate applies a transition exactly when the target is ahead.
    #[test]
    fn gate_applies_iff_forward(current in stage_strategy(), target in stage_strategy()) {
        let applied = current.validate(target) == Transition::Apply;
        prop_assert_eq!(applied, target > current);
    }
}
