// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! obrs - an offline-first mutation queue with a background sync engine.
//!
//! Writes are captured as queued operations, persisted to the state
//! directory, and applied to a remote record store in the order they were
//! made once the store is reachable.
//!
//! # Main Components
//!
//! - [`sync::SyncEngine`] - queue, drain executor, scheduler and status
//! - [`sync::RemoteBackend`] - the four calls the engine makes on the store
//! - [`sync::QueueStore`] - where the queue survives restarts
//! - [`Config`] - agent configuration (`config.toml` in the state directory)
//! - [`Error`] - error types for all CLI operations
//!
//! # Embedding
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use obrs::sync::{JsonlQueueStore, ReachabilityMonitor, SyncEngine, SyncSettings, WebSocketBackend};
//!
//! let store = Arc::new(JsonlQueueStore::open(&state_dir)?);
//! let backend = Arc::new(WebSocketBackend::new("ws://127.0.0.1:7420"));
//! let reachability = Arc::new(ReachabilityMonitor::new());
//! let engine = SyncEngine::new(backend, store, reachability.clone(), SyncSettings::default());
//! engine.start();
//!
//! engine.enqueue_delete("tasks", "t1");
//! reachability.report(true); // drains in the background
//! ```

mod cli;
mod commands;
mod env;

pub mod config;
pub mod error;
pub mod sync;

pub use cli::{Cli, Command, OutputFormat, SyncArgs};
pub use config::{init_state_dir, resolve_state_dir, Config};
pub use error::{Error, Result};

use commands::Context;

/// Execute a parsed command line. This is the main entry point for library
/// users and provides a testable way to run commands without process
/// execution.
pub fn run(cli: Cli) -> Result<()> {
    let state_dir = resolve_state_dir(cli.state_dir)?;
    if let Command::Init { remote } = cli.command {
        return commands::init::run(&state_dir, remote);
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(async {
        let ctx = Context::open(&state_dir)?;
        execute(&ctx, cli.command).await
    });
    // A stdin reader left blocked by `run` must not hold up exit
    runtime.shutdown_background();
    result
}

async fn execute(ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Init { remote } => commands::init::run(&ctx.state_dir, remote),
        Command::Create {
            collection,
            record,
            sync,
        } => commands::enqueue::create(ctx, collection, &record, sync).await,
        Command::Update {
            collection,
            id,
            fields,
            sync,
        } => commands::enqueue::update(ctx, collection, id, &fields, sync).await,
        Command::Delete {
            collection,
            id,
            sync,
        } => commands::enqueue::delete(ctx, collection, id, sync).await,
        Command::Call {
            procedure,
            args,
            sync,
        } => commands::enqueue::call(ctx, procedure, args.as_deref(), sync).await,
        Command::List { output } => commands::list::run(ctx, output),
        Command::Status { output } => commands::status::run(ctx, output).await,
        Command::Drain => commands::drain::run(ctx).await,
        Command::Clear => commands::clear::run(ctx),
        Command::Abandoned { output } => commands::abandoned::run(ctx, output),
        Command::Run { interval } => commands::run::run(ctx, interval).await,
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
