// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync status derivation and broadcasting.
//!
//! [`SyncStatus`] is never stored; it is recomputed from a handful of inputs
//! (connectivity, whether a pass is running, queue length, last report) every
//! time one of them changes. Subscribers see a new value only when the
//! derived status actually differs.
//!
//! Queue length is read from the live queue while the inputs lock is held,
//! so the last update to run always publishes the current length.

use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, DropGuard};

use super::reachability::Connectivity;

/// Coarse sync phase shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Syncing,
    Synced,
    Error,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Syncing => "syncing",
            Phase::Synced => "synced",
            Phase::Error => "error",
        };
        f.write_str(s)
    }
}

/// Counts from one completed drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Operations the backend accepted.
    pub success_count: usize,
    /// Failed calls, including those that led to abandonment.
    pub error_count: usize,
    /// Operations dropped after this pass's failure.
    pub abandoned_count: usize,
    /// Operations left untouched because connectivity dropped mid-pass.
    pub deferred_count: usize,
}

impl DrainReport {
    /// True if failed operations are still in the queue after this pass.
    pub fn has_residual_errors(&self) -> bool {
        self.error_count > self.abandoned_count
    }
}

impl std::fmt::Display for DrainReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed",
            self.success_count, self.error_count
        )?;
        if self.abandoned_count > 0 {
            write!(f, ", {} abandoned", self.abandoned_count)?;
        }
        if self.deferred_count > 0 {
            write!(f, ", {} deferred", self.deferred_count)?;
        }
        Ok(())
    }
}

/// Snapshot of the engine's externally visible state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub connectivity: Connectivity,
    pub phase: Phase,
    pub queue_length: usize,
    pub last_result: Option<DrainReport>,
}

impl SyncStatus {
    /// Derives the status from its inputs.
    pub fn derive(
        connectivity: Connectivity,
        active: bool,
        queue_length: usize,
        last_result: Option<DrainReport>,
    ) -> Self {
        let phase = match connectivity {
            Connectivity::Offline => Phase::Idle,
            Connectivity::Online if queue_length == 0 => Phase::Synced,
            Connectivity::Online if active => Phase::Syncing,
            Connectivity::Online if last_result.is_some_and(|r| r.has_residual_errors()) => Phase::Error,
            Connectivity::Online => Phase::Idle,
        };
        SyncStatus {
            connectivity,
            phase,
            queue_length,
            last_result,
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} ({} pending)",
            self.connectivity, self.phase, self.queue_length
        )
    }
}

/// Reports the current number of pending operations.
pub type QueueLength = Box<dyn Fn() -> usize + Send + Sync>;

#[derive(Debug, Clone, Copy)]
struct Inputs {
    connectivity: Connectivity,
    active: bool,
    last_result: Option<DrainReport>,
}

impl Inputs {
    fn derive(&self, queue_length: usize) -> SyncStatus {
        SyncStatus::derive(
            self.connectivity,
            self.active,
            queue_length,
            self.last_result,
        )
    }
}

/// Holds the current [`SyncStatus`] and pushes changes to subscribers.
pub struct StatusBroadcaster {
    inputs: Mutex<Inputs>,
    queue_length: QueueLength,
    tx: watch::Sender<SyncStatus>,
}

impl StatusBroadcaster {
    pub fn new(connectivity: Connectivity, queue_length: QueueLength) -> Self {
        let inputs = Inputs {
            connectivity,
            active: false,
            last_result: None,
        };
        let (tx, _) = watch::channel(inputs.derive(queue_length()));
        StatusBroadcaster {
            inputs: Mutex::new(inputs),
            queue_length,
            tx,
        }
    }

    pub fn current(&self) -> SyncStatus {
        self.tx.borrow().clone()
    }

    /// Subscribes to status changes. The first `next()` yields the current
    /// status.
    pub fn subscribe(&self) -> StatusSubscription {
        StatusSubscription {
            rx: self.tx.subscribe(),
            primed: false,
        }
    }

    /// Runs `observer` on a background task for every status change,
    /// starting with the current one. Stops when the handle is dropped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe_fn<F>(&self, mut observer: F) -> ObserverHandle
    where
        F: FnMut(&SyncStatus) + Send + 'static,
    {
        let mut subscription = self.subscribe();
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    next = subscription.next() => match next {
                        Some(status) => observer(&status),
                        None => break,
                    },
                }
            }
        });

        ObserverHandle {
            _guard: cancel_token.drop_guard(),
        }
    }

    pub fn set_connectivity(&self, connectivity: Connectivity) {
        self.update(|inputs| inputs.connectivity = connectivity);
    }

    /// Republishes after the queue was changed.
    pub fn queue_changed(&self) {
        self.update(|_| {});
    }

    /// Marks a drain pass as started.
    pub fn pass_started(&self) {
        self.update(|inputs| inputs.active = true);
    }

    /// Marks a drain pass as finished with `report`.
    pub fn pass_finished(&self, report: DrainReport) {
        self.update(|inputs| {
            inputs.active = false;
            inputs.last_result = Some(report);
        });
    }

    fn update(&self, change: impl FnOnce(&mut Inputs)) {
        let mut inputs = self.inputs.lock().unwrap_or_else(|e| e.into_inner());
        change(&mut inputs);
        let next = inputs.derive((self.queue_length)());
        self.tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                tracing::debug!("status: {}", next);
                *current = next;
                true
            }
        });
    }
}

/// A live subscription to status changes.
///
/// Intermediate values may be coalesced if the subscriber falls behind; the
/// latest status is always delivered.
pub struct StatusSubscription {
    rx: watch::Receiver<SyncStatus>,
    primed: bool,
}

impl StatusSubscription {
    /// Waits for the next status. Returns `None` once the engine is gone.
    pub async fn next(&mut self) -> Option<SyncStatus> {
        if !self.primed {
            self.primed = true;
            return Some(self.rx.borrow_and_update().clone());
        }
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Latest status without waiting.
    pub fn current(&self) -> SyncStatus {
        self.rx.borrow().clone()
    }

    /// Ends the subscription.
    pub fn unsubscribe(self) {}
}

/// Keeps a callback observer alive. Dropping it stops the observer.
pub struct ObserverHandle {
    _guard: DropGuard,
}

impl ObserverHandle {
    pub fn unsubscribe(self) {}
}
