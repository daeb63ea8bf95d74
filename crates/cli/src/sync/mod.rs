// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Offline mutation queue and sync engine.
//!
//! Every write is queued first and applied to the remote backend later, so
//! the same code path runs whether or not the network is up.
//!
//! # Architecture
//!
//! ```text
//!   enqueue ──► ┌─────────────┐  persist  ┌─────────────┐
//!               │ MutationQueue│─────────►│ QueueStore  │
//!               └──────┬──────┘           └─────────────┘
//!                      │ snapshot / reconcile
//! ┌────────────┐ ┌─────┴───────┐  insert/patch/  ┌─────────────┐
//! │ Scheduler  │►│ SyncExecutor│─remove/invoke──►│RemoteBackend│
//! └─────▲──────┘ └─────┬───────┘                 └─────────────┘
//!       │ edges        │ pass started/finished
//! ┌─────┴────────┐ ┌───▼──────────────┐
//! │ Reachability │ │ StatusBroadcaster│──► subscribers
//! └──────────────┘ └──────────────────┘
//! ```
//!
//! # Guarantees
//!
//! - FIFO: operations are applied one at a time in enqueue order
//! - At-least-once: an operation leaves the queue only when the backend
//!   accepts it or it has failed `max_attempts` times
//! - One pass at a time: overlapping drain triggers collapse
//! - Fail closed: connectivity is offline until a probe or report says
//!   otherwise

mod backend;
mod engine;
mod executor;
mod queue;
mod reachability;
mod scheduler;
mod status;
mod store;

pub use backend::{
    dispatch, BackendError, BackendFuture, BackendResult, RemoteBackend, WebSocketBackend,
};
pub use engine::{SyncEngine, SyncSettings};
pub use executor::{
    DrainOutcome, RetryPolicy, SyncExecutor, DEFAULT_CALL_TIMEOUT, DEFAULT_MAX_ATTEMPTS,
};
pub use queue::MutationQueue;
pub use reachability::{
    probe_once, probe_target, Connectivity, ProbeConfig, ProbeHandle, ReachabilityMonitor,
};
pub use scheduler::{Scheduler, DEFAULT_SYNC_INTERVAL};
pub use status::{
    DrainReport, ObserverHandle, Phase, QueueLength, StatusBroadcaster, StatusSubscription,
    SyncStatus,
};
pub use store::{JsonlQueueStore, MemoryQueueStore, QueueStore, StoreError, StoreResult};

#[cfg(test)]
mod test_helpers;


#[cfg(test)]
mod engine_tests;
