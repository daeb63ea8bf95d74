// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The public face of the sync subsystem.
//!
//! [`SyncEngine`] wires the queue, executor, scheduler and status broadcaster
//! together around injected collaborators. Build one per process and share
//! it behind an `Arc`.

use std::sync::Arc;
use std::time::Duration;

use ob_core::{IdClock, Mutation, OpId, QueuedOperation, Record};

use super::backend::RemoteBackend;
use super::executor::{DrainOutcome, RetryPolicy, SyncExecutor, DEFAULT_CALL_TIMEOUT};
use super::queue::MutationQueue;
use super::reachability::ReachabilityMonitor;
use super::scheduler::{Scheduler, DEFAULT_SYNC_INTERVAL};
use super::status::{ObserverHandle, StatusBroadcaster, StatusSubscription, SyncStatus};
use super::store::QueueStore;

/// Tunables for a [`SyncEngine`].
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Node id mixed into every operation id.
    pub node_id: u32,
    pub retry: RetryPolicy,
    /// Bound on each backend call.
    pub call_timeout: Duration,
    /// Period used by [`SyncEngine::start_periodic_sync_default`].
    pub sync_interval: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            node_id: 0,
            retry: RetryPolicy::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            sync_interval: DEFAULT_SYNC_INTERVAL,
        }
    }
}

/// Offline mutation queue plus the machinery that drains it.
pub struct SyncEngine {
    queue: Arc<MutationQueue>,
    executor: Arc<SyncExecutor>,
    scheduler: Scheduler,
    status: Arc<StatusBroadcaster>,
    reachability: Arc<ReachabilityMonitor>,
    settings: SyncSettings,
}

impl SyncEngine {
    /// Builds an engine and rehydrates the queue from `store`.
    ///
    /// No background work starts until [`SyncEngine::start`].
    pub fn new(
        backend: Arc<dyn RemoteBackend>,
        store: Arc<dyn QueueStore>,
        reachability: Arc<ReachabilityMonitor>,
        settings: SyncSettings,
    ) -> Self {
        let queue = Arc::new(MutationQueue::load(store, IdClock::new(settings.node_id)));
        let live_queue = Arc::clone(&queue);
        let status = Arc::new(StatusBroadcaster::new(
            reachability.connectivity(),
            Box::new(move || live_queue.len()),
        ));
        let executor = Arc::new(SyncExecutor::new(
            Arc::clone(&queue),
            backend,
            Arc::clone(&reachability),
            Arc::clone(&status),
            settings.retry,
            settings.call_timeout,
        ));
        let scheduler = Scheduler::new(
            Arc::clone(&executor),
            Arc::clone(&queue),
            Arc::clone(&reachability),
            Arc::clone(&status),
        );

        SyncEngine {
            queue,
            executor,
            scheduler,
            status,
            reachability,
            settings,
        }
    }

    /// Starts reacting to connectivity edges. Must be called within a
    /// runtime.
    pub fn start(&self) {
        self.scheduler.start();
    }

    /// Stops all background tasks.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }

    pub fn enqueue_create(&self, collection: impl Into<String>, record: Record) -> OpId {
        self.enqueue(Mutation::create(collection, record))
    }

    pub fn enqueue_update(
        &self,
        collection: impl Into<String>,
        id: impl Into<String>,
        fields: Record,
    ) -> OpId {
        self.enqueue(Mutation::update(collection, id, fields))
    }

    pub fn enqueue_delete(&self, collection: impl Into<String>, id: impl Into<String>) -> OpId {
        self.enqueue(Mutation::delete(collection, id))
    }

    pub fn enqueue_remote_call(&self, procedure: impl Into<String>, args: Record) -> OpId {
        self.enqueue(Mutation::remote_call(procedure, args))
    }

    /// Queues `mutation` and, if online, triggers a drain.
    ///
    /// Never fails and never waits on the network.
    pub fn enqueue(&self, mutation: Mutation) -> OpId {
        let id = self.queue.enqueue(mutation);
        self.status.queue_changed();
        self.scheduler.on_enqueue();
        id
    }

    pub fn subscribe_status(&self) -> StatusSubscription {
        self.status.subscribe()
    }

    /// Calls `observer` on every status change until the handle drops.
    pub fn subscribe_status_fn<F>(&self, observer: F) -> ObserverHandle
    where
        F: FnMut(&SyncStatus) + Send + 'static,
    {
        self.status.subscribe_fn(observer)
    }

    pub fn status(&self) -> SyncStatus {
        self.status.current()
    }

    /// Pending operations in queue order.
    pub fn pending(&self) -> Vec<QueuedOperation> {
        self.queue.snapshot()
    }

    pub fn start_periodic_sync(&self, interval: Duration) {
        self.scheduler.start_periodic(interval);
    }

    /// Starts the periodic timer with the configured interval.
    pub fn start_periodic_sync_default(&self) {
        self.scheduler.start_periodic(self.settings.sync_interval);
    }

    pub fn stop_periodic_sync(&self) {
        self.scheduler.stop_periodic();
    }

    pub fn is_periodic_sync_running(&self) -> bool {
        self.scheduler.is_periodic_running()
    }

    /// Runs a drain pass now, unless one is already running.
    pub async fn force_drain_now(&self) -> DrainOutcome {
        self.executor.drain().await
    }

    /// Drops all pending work. Returns how many operations were dropped.
    pub fn clear_queue(&self) -> usize {
        let dropped = self.queue.clear();
        self.status.queue_changed();
        if dropped > 0 {
            tracing::warn!("cleared {} pending operations", dropped);
        }
        dropped
    }

    pub fn reachability(&self) -> &Arc<ReachabilityMonitor> {
        &self.reachability
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }
}
