// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Drain passes.
//!
//! A pass snapshots the queue, applies each operation to the backend in
//! order, and commits what is left. Only one pass runs at a time; a second
//! request while one is running returns [`DrainOutcome::AlreadyRunning`]
//! without touching the backend.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ob_core::{OpId, QueuedOperation};

use super::backend::{dispatch, BackendError, BackendResult, RemoteBackend};
use super::queue::MutationQueue;
use super::reachability::ReachabilityMonitor;
use super::status::{DrainReport, StatusBroadcaster};

/// Default number of attempts before an operation is abandoned.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default bound on a single backend call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// When to give up on a failing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after which an operation is abandoned.
    pub max_attempts: u32,
    /// Abandon on the first [`BackendError::Rejected`] instead of retrying.
    pub abandon_rejected: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            abandon_rejected: false,
        }
    }
}

impl RetryPolicy {
    /// Decides whether an operation that has now failed `attempts` times
    /// with `error` should be dropped.
    pub fn should_abandon(&self, attempts: u32, error: &BackendError) -> bool {
        attempts >= self.max_attempts || (self.abandon_rejected && error.is_permanent())
    }
}

/// Result of a drain request.
#[derive(Debug, Clone, PartialEq)]
pub enum DrainOutcome {
    /// Another pass was in progress; nothing was done.
    AlreadyRunning,
    /// Connectivity was offline at pass start; nothing was dispatched.
    Offline,
    /// The pass ran to completion.
    Completed {
        report: DrainReport,
        abandoned: Vec<QueuedOperation>,
    },
}

impl DrainOutcome {
    pub fn report(&self) -> Option<&DrainReport> {
        match self {
            DrainOutcome::Completed { report, .. } => Some(report),
            _ => None,
        }
    }
}

/// Clears the busy flag on every exit path.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Runs drain passes against a backend.
pub struct SyncExecutor {
    queue: Arc<MutationQueue>,
    backend: Arc<dyn RemoteBackend>,
    reachability: Arc<ReachabilityMonitor>,
    status: Arc<StatusBroadcaster>,
    policy: RetryPolicy,
    call_timeout: Duration,
    busy: AtomicBool,
}

impl SyncExecutor {
    pub fn new(
        queue: Arc<MutationQueue>,
        backend: Arc<dyn RemoteBackend>,
        reachability: Arc<ReachabilityMonitor>,
        status: Arc<StatusBroadcaster>,
        policy: RetryPolicy,
        call_timeout: Duration,
    ) -> Self {
        SyncExecutor {
            queue,
            backend,
            reachability,
            status,
            policy,
            call_timeout,
            busy: AtomicBool::new(false),
        }
    }

    /// True while a pass is in progress.
    pub fn is_running(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Runs one drain pass.
    ///
    /// Failures never escape: they are counted in the report and folded into
    /// the broadcast status.
    pub async fn drain(&self) -> DrainOutcome {
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            tracing::debug!("drain already in progress");
            return DrainOutcome::AlreadyRunning;
        };

        let connectivity = self.reachability.connectivity();
        self.status.set_connectivity(connectivity);
        if !connectivity.is_online() {
            tracing::debug!("offline, skipping drain");
            return DrainOutcome::Offline;
        }

        let snapshot = self.queue.snapshot();
        let attempted: HashSet<OpId> = snapshot.iter().map(|op| op.id).collect();
        self.status.pass_started();
        tracing::debug!("drain pass over {} operations", snapshot.len());

        let mut report = DrainReport::default();
        let mut retained = Vec::new();
        let mut abandoned = Vec::new();

        let mut pending = snapshot.into_iter();
        while let Some(mut op) = pending.next() {
            if !self.reachability.is_online() {
                report.deferred_count = 1 + pending.len();
                tracing::info!(
                    "went offline mid-pass, deferring {} operations",
                    report.deferred_count
                );
                retained.push(op);
                retained.extend(pending.by_ref());
                break;
            }

            match self.call(&op).await {
                Ok(()) => {
                    tracing::debug!("applied {}", op);
                    report.success_count += 1;
                }
                Err(e) => {
                    report.error_count += 1;
                    op.attempts += 1;
                    if self.policy.should_abandon(op.attempts, &e) {
                        tracing::warn!(
                            "abandoning {} after {} attempts: {}",
                            op,
                            op.attempts,
                            e
                        );
                        report.abandoned_count += 1;
                        abandoned.push(op);
                    } else {
                        tracing::debug!("attempt {} of {} failed: {}", op.attempts, op, e);
                        retained.push(op);
                    }
                }
            }
        }

        self.queue.reconcile(&attempted, retained);
        for op in &abandoned {
            self.queue.record_abandoned(op);
        }

        self.status.set_connectivity(self.reachability.connectivity());
        self.status.pass_finished(report);
        tracing::info!("drain pass: {} ({} pending)", report, self.queue.len());

        DrainOutcome::Completed { report, abandoned }
    }

    async fn call(&self, op: &QueuedOperation) -> BackendResult<()> {
        let call = dispatch(self.backend.as_ref(), &op.mutation);
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(self.call_timeout)),
        }
    }
}
