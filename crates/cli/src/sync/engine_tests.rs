// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end behavior of the sync engine against a scripted backend.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use ob_core::{Mutation, Record};
use tempfile::tempdir;

use super::backend::BackendError;
use super::engine::SyncEngine;
use super::executor::{DrainOutcome, RetryPolicy};
use super::reachability::{Connectivity, ReachabilityMonitor};
use super::status::Phase;
use super::store::JsonlQueueStore;
use super::test_helpers::{record, test_settings, wait_for, Harness, MockBackend};

#[tokio::test]
async fn test_durability_across_restart() {
    let dir = tempdir().unwrap();
    let backend = Arc::new(MockBackend::new());

    let before = {
        let store = Arc::new(JsonlQueueStore::open(dir.path()).unwrap());
        let engine = SyncEngine::new(
            backend.clone(),
            store,
            Arc::new(ReachabilityMonitor::new()),
            test_settings(),
        );
        engine.enqueue_create("tasks", record(serde_json::json!({"id": "a"})));
        engine.enqueue_update("tasks", "a", record(serde_json::json!({"done": true})));
        engine.enqueue_delete("tasks", "b");
        engine.enqueue_remote_call("recount", Record::new());
        engine.pending()
    };

    let store = Arc::new(JsonlQueueStore::open(dir.path()).unwrap());
    let engine = SyncEngine::new(
        backend.clone(),
        store,
        Arc::new(ReachabilityMonitor::new()),
        test_settings(),
    );

    assert_eq!(engine.pending(), before);
    assert_eq!(engine.status().queue_length, 4);
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_at_least_once_after_transient_failures() {
    let h = Harness::new(test_settings());
    h.engine.enqueue_delete("tasks", "a");
    h.backend.fail_next(3, BackendError::Network("flaky".into()));
    h.reachability.report(true);

    for _ in 0..3 {
        let report = *h.engine.force_drain_now().await.report().unwrap();
        assert_eq!(report.error_count, 1);
    }
    let report = *h.engine.force_drain_now().await.report().unwrap();
    assert_eq!(report.success_count, 1);

    // Exactly one successful call among the four attempts
    assert_eq!(h.backend.call_count(), 4);
    assert!(h.engine.pending().is_empty());
    assert!(h.store.abandoned().is_empty());
}

#[tokio::test]
async fn test_bounded_abandonment_reports_once() {
    let h = Harness::new(test_settings());
    h.engine.enqueue_delete("tasks", "doomed");
    h.backend
        .fail_always_for("doomed", BackendError::Server("no".into()));
    h.reachability.report(true);

    let mut abandoned_total = 0;
    for _ in 0..8 {
        if let DrainOutcome::Completed { abandoned, .. } = h.engine.force_drain_now().await {
            abandoned_total += abandoned.len();
        }
    }

    assert_eq!(h.backend.call_count(), 5);
    assert_eq!(abandoned_total, 1);
    assert_eq!(h.store.abandoned().len(), 1);
    assert_eq!(h.store.abandoned()[0].attempts, 5);
    assert!(h.engine.pending().is_empty());
}

#[tokio::test]
async fn test_rejected_abandoned_immediately_when_configured() {
    let mut settings = test_settings();
    settings.retry = RetryPolicy {
        abandon_rejected: true,
        ..RetryPolicy::default()
    };
    let h = Harness::new(settings);
    h.engine.enqueue_delete("tasks", "a");
    h.backend
        .fail_always_for("a", BackendError::Rejected("forbidden".into()));
    h.reachability.report(true);

    let report = *h.engine.force_drain_now().await.report().unwrap();

    assert_eq!(report.abandoned_count, 1);
    assert_eq!(h.backend.call_count(), 1);
    assert_eq!(h.store.abandoned()[0].attempts, 1);
}

#[tokio::test]
async fn test_ordering_after_reconnect() {
    let h = Harness::new(test_settings());
    h.engine.start();

    h.engine.enqueue_create("tasks", record(serde_json::json!({"id": "A"})));
    h.engine.enqueue_update("tasks", "B", Record::new());
    h.engine.enqueue_delete("tasks", "C");

    h.reachability.report(true);

    assert!(wait_for(|| h.engine.pending().is_empty()).await);
    assert_eq!(h.backend.call_keys(), vec!["A", "B", "C"]);
}

#[tokio::test]
async fn test_no_double_drain_under_concurrent_triggers() {
    let h = Harness::new(test_settings());
    h.engine.enqueue_delete("tasks", "a");
    h.engine.enqueue_delete("tasks", "b");
    h.engine.enqueue_delete("tasks", "c");
    h.backend.set_delay(Duration::from_millis(20));
    h.reachability.report(true);

    h.engine.start_periodic_sync(Duration::from_millis(5));
    let outcomes = futures_util::future::join_all((0..4).map(|_| h.engine.force_drain_now())).await;
    assert!(wait_for(|| h.engine.pending().is_empty()).await);
    h.engine.stop_periodic_sync();

    let mut keys = h.backend.call_keys();
    keys.sort();
    assert_eq!(keys, vec!["a", "b", "c"]);
    let completed = outcomes
        .iter()
        .filter(|o| matches!(o, DrainOutcome::Completed { .. }))
        .count();
    assert!(completed <= 1);
}

#[tokio::test]
async fn test_status_scenario() {
    let h = Harness::new(test_settings());
    h.engine.start();
    let mut sub = h.engine.subscribe_status();

    let s = sub.next().await.unwrap();
    assert_eq!(
        (s.connectivity, s.phase, s.queue_length),
        (Connectivity::Offline, Phase::Idle, 0)
    );

    h.engine.enqueue_create("tasks", record(serde_json::json!({"id": "x"})));
    let s = sub.next().await.unwrap();
    assert_eq!(
        (s.connectivity, s.phase, s.queue_length),
        (Connectivity::Offline, Phase::Idle, 1)
    );

    h.reachability.report(true);
    let last = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let s = sub.next().await.unwrap();
            if s.phase == Phase::Synced {
                return s;
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(last.connectivity, Connectivity::Online);
    assert_eq!(last.queue_length, 0);
    assert_eq!(h.backend.call_count(), 1);
}

#[tokio::test]
async fn test_partial_failure_scenario() {
    let h = Harness::new(test_settings());
    h.engine.enqueue_update("tasks", "u1", Record::new());
    h.engine.enqueue_update("tasks", "u2", Record::new());
    h.engine.enqueue_update("tasks", "u3", Record::new());
    h.backend
        .fail_always_for("u2", BackendError::Server("conflict".into()));
    h.reachability.report(true);

    let outcome = h.engine.force_drain_now().await;

    let report = *outcome.report().unwrap();
    assert_eq!((report.success_count, report.error_count), (2, 1));
    let pending = h.engine.pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].mutation.record_id(), Some("u2"));
    assert_eq!(pending[0].attempts, 1);

    let status = h.engine.status();
    assert_eq!(status.connectivity, Connectivity::Online);
    assert_eq!(status.phase, Phase::Error);
    assert_eq!(status.queue_length, 1);
}

#[tokio::test]
async fn test_clear_queue_drops_everything() {
    let h = Harness::new(test_settings());
    h.engine.enqueue(Mutation::delete("tasks", "a"));
    h.engine.enqueue(Mutation::delete("tasks", "b"));

    assert_eq!(h.engine.clear_queue(), 2);
    assert!(h.engine.pending().is_empty());
    assert!(h.store.saved().is_empty());
    assert_eq!(h.engine.status().queue_length, 0);
}

#[tokio::test]
async fn test_enqueue_survives_store_failure() {
    let h = Harness::new(test_settings());
    h.store.set_fail_saves(true);

    let id = h.engine.enqueue_delete("tasks", "a");

    assert_eq!(h.engine.pending()[0].id, id);
    assert!(h.store.saved().is_empty());
}
