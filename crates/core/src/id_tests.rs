// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tests for ID generation

use super::*;

#[test]
fn uuid_gen_produces_unique_ids() {
    let ids = UuidIdGen;
    let a = ids.next();
    let b = ids.next();
    assert_ne!(a, b);
    assert_eq!(a.len(), 36);
}

#[test]
fn uuid_gen_short_is_eight_chars() {
    let ids = UuidIdGen;
    assert_eq!(ids.short().len(), 8);
}

#[test]
fn sequential_gen_counts_up() {
    let ids = SequentialIdGen::new("run");
    assert_eq!(ids.next(), "run-1");
    assert_eq!(ids.next(), "run-2");
    assert_eq!(ids.next(), "run-3");
}

#[test]
fn sequential_gen_clones_share_counter() {
    let ids = SequentialIdGen::new("run");
    let other = ids.clone();
    assert_eq!(ids.next(), "run-1");
    assert_eq!(other.next(), "run-2");
}
