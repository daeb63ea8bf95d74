// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

// Allow unused items: test helpers are shared across multiple test binaries,
// and not every test file uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;

pub use predicates::prelude::*;
pub use tempfile::TempDir;

/// `outbox` pointed at `state`, with no backend override from the caller's
/// environment.
pub fn outbox(state: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("outbox");
    cmd.env("OUTBOX_STATE_DIR", state.path())
        .env_remove("OUTBOX_REMOTE")
        .env_remove("RUST_LOG");
    cmd
}

/// A URL nothing is listening on.
pub fn dead_remote() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);
    url
}

/// State directory initialized against an unreachable backend.
pub fn init_offline() -> TempDir {
    let state = TempDir::new().unwrap();
    outbox(&state)
        .args(["init", "--remote", &dead_remote()])
        .assert()
        .success();
    state
}

/// Parses `list -o json` into the queued operations.
pub fn pending(state: &TempDir) -> Vec<serde_json::Value> {
    let output = outbox(state).args(["list", "-o", "json"]).output().unwrap();
    assert!(output.status.success());
    serde_json::from_slice(&output.stdout).unwrap()
}
