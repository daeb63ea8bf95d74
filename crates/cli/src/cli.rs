// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Parse a string that must not be empty or whitespace-only.
fn non_empty_string(s: &str) -> Result<String, String> {
    if s.trim().is_empty() {
        Err("cannot be empty".to_string())
    } else {
        Ok(s.to_string())
    }
}

/// Output format for commands supporting structured output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "outbox")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Offline-first write queue that syncs to a remote record store")]
#[command(
    long_about = "Offline-first write queue that syncs to a remote record store.\n\n\
    Every write is queued durably first and applied to the backend in order \
    once it is reachable."
)]
pub struct Cli {
    /// Directory holding the queue and config (default: platform state dir)
    #[arg(long, global = true, value_name = "path")]
    pub state_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Flags shared by the commands that enqueue.
#[derive(Args, Debug, Clone, Copy)]
pub struct SyncArgs {
    /// Only queue; don't try to reach the backend
    #[arg(long)]
    pub no_sync: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a config file into the state directory
    Init {
        /// Backend WebSocket URL
        #[arg(long, value_name = "url")]
        remote: Option<String>,
    },

    /// Queue a record creation
    #[command(after_help = "\
Examples:
  outbox create tasks '{\"id\": \"t1\", \"title\": \"Buy milk\"}'")]
    Create {
        #[arg(value_parser = non_empty_string)]
        collection: String,
        /// Full record as a JSON object
        record: String,
        #[command(flatten)]
        sync: SyncArgs,
    },

    /// Queue a partial update of a record
    #[command(after_help = "\
Examples:
  outbox update tasks t1 '{\"done\": true}'")]
    Update {
        #[arg(value_parser = non_empty_string)]
        collection: String,
        #[arg(value_parser = non_empty_string)]
        id: String,
        /// Changed fields as a JSON object
        fields: String,
        #[command(flatten)]
        sync: SyncArgs,
    },

    /// Queue a record deletion
    Delete {
        #[arg(value_parser = non_empty_string)]
        collection: String,
        #[arg(value_parser = non_empty_string)]
        id: String,
        #[command(flatten)]
        sync: SyncArgs,
    },

    /// Queue a remote procedure call
    #[command(after_help = "\
Examples:
  outbox call close_shift '{\"shift\": 12}'
  outbox call ping")]
    Call {
        #[arg(value_parser = non_empty_string)]
        procedure: String,
        /// Arguments as a JSON object (default: {})
        args: Option<String>,
        #[command(flatten)]
        sync: SyncArgs,
    },

    /// Show pending operations in queue order
    List {
        #[arg(short, long, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// Show connectivity, phase and queue length
    Status {
        #[arg(short, long, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// Run one drain pass now
    Drain,

    /// Drop all pending operations
    Clear,

    /// Show operations abandoned after exhausting their retries
    Abandoned {
        #[arg(short, long, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// Run in the foreground, syncing in the background and reading
    /// commands from stdin
    #[command(after_help = "\
Commands (one per line):
  create <collection> <json>
  update <collection> <id> <json>
  delete <collection> <id>
  call <procedure> [json]
  drain | clear | status | quit")]
    Run {
        /// Periodic drain interval in seconds (default: from config)
        #[arg(long, value_name = "secs")]
        interval: Option<u64>,
    },
}

#[cfg(test)]
#[path = "cli_tests/mod.rs"]
mod tests;
