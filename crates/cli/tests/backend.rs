// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end tests against a real `ob-remote` server.
//!
//! # Requirements
//!
//! The `ob-remote` binary must be built and available in the same target directory.
//! Run `cargo build -p ob-remote` before running these tests.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

mod common;
use common::*;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Child, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use obrs::sync::{
    DrainOutcome, JsonlQueueStore, ReachabilityMonitor, SyncEngine, SyncSettings,
    WebSocketBackend,
};

/// Helper macro to skip tests when ob-remote binary is not available.
/// Prints a message and returns early instead of failing.
macro_rules! require_server {
    () => {
        match TestServer::spawn() {
            Some(server) => server,
            None => {
                eprintln!(
                    "SKIPPED: ob-remote binary not found. Run `cargo build -p ob-remote` first."
                );
                return;
            }
        }
    };
}

/// Find the ob-remote binary path.
///
/// Searches in order:
/// 1. OB_REMOTE_BIN environment variable
/// 2. Same target directory (for workspace builds)
fn find_ob_remote() -> Option<PathBuf> {
    let binary_name = if cfg!(windows) {
        "ob-remote.exe"
    } else {
        "ob-remote"
    };

    if let Ok(path) = std::env::var("OB_REMOTE_BIN") {
        let binary_path = PathBuf::from(path);
        if binary_path.exists() {
            return Some(binary_path);
        }
    }

    // test_exe is at: target/{debug,release}/deps/backend-*
    // ob-remote is at: target/{debug,release}/ob-remote
    let test_exe = std::env::current_exe().ok()?;
    let profile_dir = test_exe.parent()?.parent()?;
    let binary_path = profile_dir.join(binary_name);
    binary_path.exists().then_some(binary_path)
}

/// Helper to spawn `ob-remote` and clean up on drop.
struct TestServer {
    child: Child,
    port: u16,
    _data_dir: TempDir,
}

impl TestServer {
    /// Spawn a new test server, trying multiple ports if needed.
    /// Returns `None` if the binary is not found (test should be skipped).
    fn spawn() -> Option<Self> {
        let binary = find_ob_remote()?;

        for attempt in 0..5 {
            let port = Self::random_port(attempt);

            // Check port is available before spawning
            if let Ok(listener) = TcpListener::bind(("127.0.0.1", port)) {
                drop(listener);
                if let Ok(server) = Self::try_spawn(&binary, port) {
                    if server.wait_ready() {
                        return Some(server);
                    }
                }
            }
        }
        panic!("ob-remote binary found but failed to start server after 5 port attempts");
    }

    fn try_spawn(binary: &PathBuf, port: u16) -> Result<Self, std::io::Error> {
        let data_dir = TempDir::new()?;

        let child = std::process::Command::new(binary)
            .arg("--bind")
            .arg(format!("127.0.0.1:{}", port))
            .arg("--data")
            .arg(data_dir.path())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(TestServer {
            child,
            port,
            _data_dir: data_dir,
        })
    }

    /// Generate a random port in the ephemeral range.
    fn random_port(attempt: u32) -> u16 {
        let mut hasher = DefaultHasher::new();
        std::process::id().hash(&mut hasher);
        std::thread::current().id().hash(&mut hasher);
        Instant::now().hash(&mut hasher);
        attempt.hash(&mut hasher);

        // Ephemeral port range: 49152-65535
        49152 + (hasher.finish() % 16383) as u16
    }

    fn url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }

    /// Wait for server to accept connections, with retries.
    fn wait_ready(&self) -> bool {
        for _ in 0..50 {
            if std::net::TcpStream::connect(("127.0.0.1", self.port)).is_ok() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(100));
        }
        false
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        // Wait to reap zombie (prevents resource leak)
        let _ = self.child.wait();
    }
}

#[test]
fn create_syncs_immediately_when_reachable() {
    let server = require_server!();
    let state = TempDir::new().unwrap();
    outbox(&state)
        .args(["init", "--remote", &server.url()])
        .assert()
        .success();

    outbox(&state)
        .args(["create", "tasks", r#"{"id": "t1", "title": "A"}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains("Synced: 1 succeeded, 0 failed (0 pending)"));

    assert!(pending(&state).is_empty());
}

#[test]
fn offline_work_drains_in_order_once_reachable() {
    let server = require_server!();
    let state = init_offline();

    for args in [
        vec!["create", "tasks", r#"{"id": "t1"}"#],
        vec!["update", "tasks", "t1", r#"{"done": true}"#],
        vec!["call", "count", r#"{"collection": "tasks"}"#],
    ] {
        outbox(&state).args(&args).assert().success();
    }
    assert_eq!(pending(&state).len(), 3);

    outbox(&state)
        .env("OUTBOX_REMOTE", server.url())
        .arg("drain")
        .assert()
        .success()
        .stdout(predicate::str::contains("3 succeeded, 0 failed"));
    assert!(pending(&state).is_empty());
}

#[test]
fn rejected_update_is_retained_for_retry() {
    let server = require_server!();
    let state = TempDir::new().unwrap();
    outbox(&state)
        .args(["init", "--remote", &server.url()])
        .assert()
        .success();

    outbox(&state)
        .args(["update", "tasks", "ghost", r#"{"done": true}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 succeeded, 1 failed (1 pending)"));

    let ops = pending(&state);
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0]["attempts"], 1);
}

#[tokio::test]
async fn engine_drains_on_reconnect() {
    let server = require_server!();
    let state = TempDir::new().unwrap();

    let store = Arc::new(JsonlQueueStore::open(state.path()).unwrap());
    let reachability = Arc::new(ReachabilityMonitor::new());
    let engine = SyncEngine::new(
        Arc::new(WebSocketBackend::new(server.url())),
        store,
        reachability.clone(),
        SyncSettings::default(),
    );
    engine.start();

    let mut record = ob_core::Record::new();
    record.insert("id".into(), "t1".into());
    engine.enqueue_create("tasks", record);
    engine.enqueue_delete("tasks", "t1");
    assert_eq!(engine.pending().len(), 2);

    reachability.report(true);
    let deadline = Instant::now() + Duration::from_secs(5);
    while !engine.pending().is_empty() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(engine.pending().is_empty());

    // Nothing left for a forced pass to do
    match engine.force_drain_now().await {
        DrainOutcome::Completed { report, .. } => assert_eq!(report.success_count, 0),
        other => panic!("unexpected outcome {:?}", other),
    }
    engine.shutdown();
}
