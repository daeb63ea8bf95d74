// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The mutation queue: ordered, durable holding area for pending writes.
//!
//! The in-memory list is authoritative for the lifetime of the process. Every
//! change is written through to the [`QueueStore`] while the list lock is
//! held, so the persisted order always matches memory. Store failures are
//! logged and swallowed: a user-facing write must never fail because the
//! disk did.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use ob_core::{IdClock, Mutation, OpId, QueuedOperation};

use super::store::QueueStore;

/// Ordered list of pending operations backed by a [`QueueStore`].
pub struct MutationQueue {
    ops: Mutex<Vec<QueuedOperation>>,
    store: Arc<dyn QueueStore>,
    ids: IdClock,
}

impl MutationQueue {
    /// Rehydrates the queue from `store`.
    ///
    /// An unreadable or corrupt store yields an empty queue; queued work is
    /// best-effort, not a source of truth.
    pub fn load(store: Arc<dyn QueueStore>, ids: IdClock) -> Self {
        let ops = match store.load() {
            Ok(ops) => ops,
            Err(e) => {
                tracing::warn!("discarding unreadable offline queue: {}", e);
                Vec::new()
            }
        };

        if let Some(newest) = ops.iter().map(|op| op.id).max() {
            ids.observe(&newest);
        }
        if !ops.is_empty() {
            tracing::info!("rehydrated {} pending operations", ops.len());
        }

        MutationQueue {
            ops: Mutex::new(ops),
            store,
            ids,
        }
    }

    /// Appends `mutation` to the tail and returns its id.
    pub fn enqueue(&self, mutation: Mutation) -> OpId {
        let mut ops = self.lock();
        let op = QueuedOperation::new(self.ids.next(), mutation, Utc::now());
        let id = op.id;
        tracing::debug!("enqueued {}", op);
        ops.push(op);
        self.persist(&ops);
        id
    }

    /// Ordered copy of everything pending.
    pub fn snapshot(&self) -> Vec<QueuedOperation> {
        self.lock().clone()
    }

    /// Removes one operation. Returns false if it was not queued.
    pub fn remove(&self, id: OpId) -> bool {
        let mut ops = self.lock();
        let before = ops.len();
        ops.retain(|op| op.id != id);
        let removed = ops.len() != before;
        if removed {
            self.persist(&ops);
        }
        removed
    }

    /// Swaps in a whole new pending list.
    pub fn replace_all(&self, new_ops: Vec<QueuedOperation>) {
        let mut ops = self.lock();
        *ops = new_ops;
        self.persist(&ops);
    }

    /// Commits the outcome of a drain pass.
    ///
    /// `attempted` is the pass's snapshot; `retained` are the snapshot ops
    /// that stay queued. The new list is `retained` followed by every live
    /// op that was not in the snapshot (enqueued during the pass). Retained
    /// ops that were removed or cleared while the pass ran stay gone.
    pub fn reconcile(&self, attempted: &HashSet<OpId>, retained: Vec<QueuedOperation>) {
        let mut ops = self.lock();
        let live: HashSet<OpId> = ops.iter().map(|op| op.id).collect();

        let mut next: Vec<QueuedOperation> = retained
            .into_iter()
            .filter(|op| live.contains(&op.id))
            .collect();
        next.extend(ops.iter().filter(|op| !attempted.contains(&op.id)).cloned());

        *ops = next;
        self.persist(&ops);
    }

    /// Drops everything pending. Returns how many operations were dropped.
    pub fn clear(&self) -> usize {
        let mut ops = self.lock();
        let dropped = ops.len();
        ops.clear();
        self.persist(&ops);
        dropped
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Records an abandoned operation in the store's dead-letter log.
    pub fn record_abandoned(&self, op: &QueuedOperation) {
        if let Err(e) = self.store.record_abandoned(op) {
            tracing::warn!("failed to record abandoned operation {}: {}", op.id, e);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<QueuedOperation>> {
        self.ops.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, ops: &[QueuedOperation]) {
        if let Err(e) = self.store.save(ops) {
            tracing::warn!("failed to persist offline queue ({} ops): {}", ops.len(), e);
        }
    }
}
