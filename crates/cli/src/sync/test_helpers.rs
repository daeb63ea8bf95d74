// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for sync module tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use ob_core::{Mutation, OpId, QueuedOperation, Record};
use serde_json::Value;

use super::backend::{BackendError, BackendFuture, BackendResult, RemoteBackend};
use super::engine::{SyncEngine, SyncSettings};
use super::reachability::ReachabilityMonitor;
use super::store::MemoryQueueStore;

/// Builds a record from a JSON object literal.
pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

/// Create-operation with the given wall clock timestamp.
pub fn make_op(wall_ms: u64) -> QueuedOperation {
    QueuedOperation::new(
        OpId::new(wall_ms, 0, 1),
        Mutation::create(
            "tasks",
            record(serde_json::json!({ "id": format!("t{wall_ms}") })),
        ),
        Utc::now(),
    )
}

/// Update-operation on `tasks/<id>`.
pub fn make_update(wall_ms: u64, id: &str) -> QueuedOperation {
    QueuedOperation::new(
        OpId::new(wall_ms, 0, 1),
        Mutation::update("tasks", id, record(serde_json::json!({ "done": true }))),
        Utc::now(),
    )
}

type AfterCall = Box<dyn Fn(usize) + Send + Sync>;

/// Scriptable in-memory backend.
///
/// By default every call succeeds. Failures can be queued for the next
/// calls or pinned to a record id / procedure name.
#[derive(Default)]
pub struct MockBackend {
    calls: Mutex<Vec<Mutation>>,
    next_failures: Mutex<VecDeque<BackendError>>,
    pinned_failures: Mutex<Vec<(String, BackendError)>>,
    delay: Mutex<Duration>,
    after_call: Mutex<Option<AfterCall>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` calls fail with `error`.
    pub fn fail_next(&self, count: usize, error: BackendError) {
        let mut failures = self.next_failures.lock().unwrap();
        for _ in 0..count {
            failures.push_back(error.clone());
        }
    }

    /// Every call whose record id or procedure is `key` fails with `error`.
    pub fn fail_always_for(&self, key: &str, error: BackendError) {
        self.pinned_failures
            .lock()
            .unwrap()
            .push((key.to_string(), error));
    }

    /// Stops failing calls for `key`.
    pub fn heal(&self, key: &str) {
        self.pinned_failures.lock().unwrap().retain(|(k, _)| k != key);
    }

    /// Every call waits `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Runs `hook` with the 1-based call number after each call.
    pub fn after_call(&self, hook: impl Fn(usize) + Send + Sync + 'static) {
        *self.after_call.lock().unwrap() = Some(Box::new(hook));
    }

    /// Every mutation received, in order.
    pub fn calls(&self) -> Vec<Mutation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Record id (or procedure name) of every call, in order.
    pub fn call_keys(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|m| m.record_id().unwrap_or(m.target()).to_string())
            .collect()
    }

    fn respond(&self, mutation: Mutation) -> BackendFuture<'_> {
        Box::pin(async move {
            let delay = *self.delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let n = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(mutation.clone());
                calls.len()
            };
            let result = self.outcome(&mutation);

            if let Some(hook) = self.after_call.lock().unwrap().as_ref() {
                hook(n);
            }
            result
        })
    }

    fn outcome(&self, mutation: &Mutation) -> BackendResult<()> {
        let key = mutation.record_id().unwrap_or(mutation.target());
        let pinned = self.pinned_failures.lock().unwrap();
        if let Some((_, error)) = pinned.iter().find(|(k, _)| k == key) {
            return Err(error.clone());
        }
        drop(pinned);

        match self.next_failures.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl RemoteBackend for MockBackend {
    fn insert(&self, collection: String, record: Record) -> BackendFuture<'_> {
        self.respond(Mutation::Create { collection, record })
    }

    fn patch(&self, collection: String, id: String, fields: Record) -> BackendFuture<'_> {
        self.respond(Mutation::Update {
            collection,
            id,
            fields,
        })
    }

    fn remove(&self, collection: String, id: String) -> BackendFuture<'_> {
        self.respond(Mutation::Delete { collection, id })
    }

    fn invoke(&self, procedure: String, args: Record) -> BackendFuture<'_> {
        self.respond(Mutation::RemoteCall { procedure, args })
    }
}

/// An engine wired to mocks, with handles to each collaborator.
pub struct Harness {
    pub engine: SyncEngine,
    pub backend: Arc<MockBackend>,
    pub store: Arc<MemoryQueueStore>,
    pub reachability: Arc<ReachabilityMonitor>,
}

impl Harness {
    pub fn new(settings: SyncSettings) -> Self {
        Self::with_store(settings, Arc::new(MemoryQueueStore::new()))
    }

    /// Builds an engine over an existing store, simulating a restart.
    pub fn with_store(settings: SyncSettings, store: Arc<MemoryQueueStore>) -> Self {
        let backend = Arc::new(MockBackend::new());
        let reachability = Arc::new(ReachabilityMonitor::new());
        let engine = SyncEngine::new(
            backend.clone(),
            store.clone(),
            reachability.clone(),
            settings,
        );
        Harness {
            engine,
            backend,
            store,
            reachability,
        }
    }
}

/// Settings with a short call timeout for tests.
pub fn test_settings() -> SyncSettings {
    SyncSettings {
        node_id: 1,
        call_timeout: Duration::from_millis(500),
        ..SyncSettings::default()
    }
}

/// Polls `condition` until it holds or two seconds pass.
pub async fn wait_for(condition: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
