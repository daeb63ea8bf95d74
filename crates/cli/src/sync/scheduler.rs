// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Drain triggers.
//!
//! Three things start a pass: an enqueue while online, the offline→online
//! edge, and a periodic ticker. Every trigger goes through the executor, so
//! overlapping triggers collapse into the pass already running.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::executor::SyncExecutor;
use super::queue::MutationQueue;
use super::reachability::ReachabilityMonitor;
use super::status::StatusBroadcaster;

/// Default period of the background drain timer.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);

/// Owns the background tasks that trigger drains.
///
/// All tasks are children of one lifecycle token; [`Scheduler::shutdown`]
/// (or dropping the scheduler) stops them.
pub struct Scheduler {
    executor: Arc<SyncExecutor>,
    queue: Arc<MutationQueue>,
    reachability: Arc<ReachabilityMonitor>,
    status: Arc<StatusBroadcaster>,
    lifecycle: CancellationToken,
    periodic: Mutex<Option<CancellationToken>>,
}

impl Scheduler {
    pub fn new(
        executor: Arc<SyncExecutor>,
        queue: Arc<MutationQueue>,
        reachability: Arc<ReachabilityMonitor>,
        status: Arc<StatusBroadcaster>,
    ) -> Self {
        Scheduler {
            executor,
            queue,
            reachability,
            status,
            lifecycle: CancellationToken::new(),
            periodic: Mutex::new(None),
        }
    }

    /// Starts watching connectivity edges. Must be called within a runtime.
    pub fn start(&self) {
        let mut edges = self.reachability.subscribe();
        let token = self.lifecycle.child_token();
        let executor = Arc::clone(&self.executor);
        let status = Arc::clone(&self.status);

        // Catch up with anything reported before we subscribed
        let initial = *edges.borrow_and_update();
        status.set_connectivity(initial);
        if initial.is_online() {
            self.spawn_drain("startup");
        }

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    changed = edges.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }

                let connectivity = *edges.borrow_and_update();
                status.set_connectivity(connectivity);
                if connectivity.is_online() {
                    tracing::info!("back online, draining queue");
                    let executor = Arc::clone(&executor);
                    tokio::spawn(async move {
                        executor.drain().await;
                    });
                }
            }
            tracing::debug!("edge watcher stopped");
        });
    }

    /// Called after every enqueue.
    pub fn on_enqueue(&self) {
        if self.reachability.is_online() {
            self.spawn_drain("enqueue");
        }
    }

    /// Starts (or restarts) the periodic drain timer.
    ///
    /// Ticks while offline or with an empty queue do nothing.
    pub fn start_periodic(&self, period: Duration) {
        let period = period.max(Duration::from_millis(1));
        let token = self.lifecycle.child_token();
        if let Some(previous) = self.periodic_slot().replace(token.clone()) {
            previous.cancel();
        }

        let executor = Arc::clone(&self.executor);
        let queue = Arc::clone(&self.queue);
        let reachability = Arc::clone(&self.reachability);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                if !reachability.is_online() || queue.is_empty() {
                    continue;
                }
                tracing::debug!("periodic drain");
                executor.drain().await;
            }
            tracing::debug!("periodic timer stopped");
        });
        tracing::debug!("periodic sync every {:?}", period);
    }

    /// Stops the periodic timer, if running.
    pub fn stop_periodic(&self) {
        if let Some(token) = self.periodic_slot().take() {
            token.cancel();
        }
    }

    /// True while a periodic timer is installed.
    pub fn is_periodic_running(&self) -> bool {
        self.periodic_slot()
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    /// Stops every background task.
    pub fn shutdown(&self) {
        self.stop_periodic();
        self.lifecycle.cancel();
    }

    fn spawn_drain(&self, reason: &str) {
        if self.lifecycle.is_cancelled() {
            tracing::debug!("scheduler stopped, ignoring {} trigger", reason);
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::debug!("drain triggered by {}", reason);
                let executor = Arc::clone(&self.executor);
                handle.spawn(async move {
                    executor.drain().await;
                });
            }
            Err(_) => tracing::debug!("no runtime, {} drain deferred", reason),
        }
    }

    fn periodic_slot(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.periodic.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.lifecycle.cancel();
    }
}
