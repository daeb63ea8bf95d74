// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod abandoned;
pub mod clear;
pub mod drain;
pub mod enqueue;
pub mod init;
pub mod list;
pub mod run;
pub mod status;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{validate_url, Config};
use crate::error::Result;
use crate::sync::{
    probe_once, Connectivity, DrainOutcome, JsonlQueueStore, ReachabilityMonitor, SyncEngine,
    WebSocketBackend,
};

/// Everything a command needs: config, the locked queue store and an
/// engine built on top of it.
pub struct Context {
    pub state_dir: PathBuf,
    pub config: Config,
    pub store: Arc<JsonlQueueStore>,
    pub engine: SyncEngine,
}

impl Context {
    /// Opens the state directory, taking the queue lock.
    ///
    /// `OUTBOX_REMOTE` overrides the configured backend URL.
    pub fn open(state_dir: &Path) -> Result<Self> {
        let mut config = Config::load_or_default(state_dir)?;
        if let Some(url) = crate::env::remote_url() {
            validate_url(&url)?;
            config.remote.url = url;
        }

        let store = Arc::new(JsonlQueueStore::open(state_dir)?);
        let backend = Arc::new(WebSocketBackend::new(config.remote.url.clone()));
        let engine = SyncEngine::new(
            backend,
            store.clone(),
            Arc::new(ReachabilityMonitor::new()),
            config.sync_settings(),
        );

        Ok(Context {
            state_dir: state_dir.to_path_buf(),
            config,
            store,
            engine,
        })
    }

    /// Probes the backend once and feeds the result to the engine.
    pub async fn probe(&self) -> Connectivity {
        let online = match self.config.probe_config() {
            Some(probe) => probe_once(&probe.addr, probe.timeout).await,
            None => false,
        };
        self.engine.reachability().report(online);
        Connectivity::from_online(online)
    }
}

/// Prints the result of a drain request.
pub fn print_outcome(outcome: &DrainOutcome, pending: usize) {
    match outcome {
        DrainOutcome::AlreadyRunning => println!("Drain already in progress."),
        DrainOutcome::Offline => println!("Offline, {} pending.", pending),
        DrainOutcome::Completed { report, abandoned } => {
            println!("Synced: {} ({} pending)", report, pending);
            for op in abandoned {
                println!("Abandoned {} after {} attempts", op, op.attempts);
            }
        }
    }
}
