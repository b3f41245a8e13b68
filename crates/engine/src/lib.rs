// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Drover scheduling engine: admission control, worker lifecycle,
//! claim reconciliation

mod poller;
mod reconcile;
mod tracker;
mod worker;

pub use poller::{CycleStats, Poller, PollerDeps};
pub use reconcile::{orphaned_claims, OrphanedClaim};
pub use tracker::{ProcessTracker, ReapedWorker, TrackerError, WorkerStatus};
pub use worker::{Worker, WorkerDeps, WorkerSettings};
