// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Foreground agent.
//!
//! Keeps a reachability probe and the periodic drain timer running, prints
//! every status change, and reads line commands from stdin until EOF,
//! `quit` or Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use ob_core::{parse_record, Mutation, Record};
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{print_outcome, Context};
use crate::error::{Error, Result};
use crate::sync::ProbeHandle;

/// A parsed stdin line.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentCommand {
    Enqueue(Mutation),
    Drain,
    Clear,
    Status,
    Quit,
}

pub async fn run(ctx: &Context, interval: Option<u64>) -> Result<()> {
    let probe = match ctx.config.probe_config() {
        Some(config) => Some(ProbeHandle::spawn(
            Arc::clone(ctx.engine.reachability()),
            config,
        )),
        None => {
            tracing::warn!("no probe address for {}, staying offline", ctx.config.remote.url);
            None
        }
    };

    ctx.engine.start();
    let period = interval
        .map(Duration::from_secs)
        .unwrap_or(ctx.engine.settings().sync_interval);
    ctx.engine.start_periodic_sync(period);
    let observer = ctx
        .engine
        .subscribe_status_fn(|status| println!("status: {}", status));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_line(&line) {
                    Ok(None) => {}
                    Ok(Some(AgentCommand::Quit)) => break,
                    Ok(Some(command)) => execute(ctx, command).await,
                    Err(e) => eprintln!("error: {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    observer.unsubscribe();
    ctx.engine.shutdown();
    if let Some(probe) = probe {
        probe.stop().await;
    }
    let pending = ctx.engine.pending().len();
    if pending > 0 {
        println!("Stopped with {} pending.", pending);
    }
    Ok(())
}

async fn execute(ctx: &Context, command: AgentCommand) {
    match command {
        AgentCommand::Enqueue(mutation) => {
            let id = ctx.engine.enqueue(mutation);
            println!("Queued {}", id);
        }
        AgentCommand::Drain => {
            let outcome = ctx.engine.force_drain_now().await;
            print_outcome(&outcome, ctx.engine.status().queue_length);
        }
        AgentCommand::Clear => {
            println!("Cleared {} pending operations.", ctx.engine.clear_queue());
        }
        AgentCommand::Status => println!("status: {}", ctx.engine.status()),
        AgentCommand::Quit => {}
    }
}

/// Parses one stdin line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<AgentCommand>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (word, rest) = split_word(line);
    let command = match word {
        "create" => {
            let (collection, json) = split_word(rest);
            let collection = required(collection, "collection")?;
            if json.is_empty() {
                return Err(Error::Usage("create <collection> <json>"));
            }
            AgentCommand::Enqueue(Mutation::create(collection, parse_record(json)?))
        }
        "update" => {
            let (collection, rest) = split_word(rest);
            let (id, json) = split_word(rest);
            let collection = required(collection, "collection")?;
            let id = required(id, "id")?;
            if json.is_empty() {
                return Err(Error::Usage("update <collection> <id> <json>"));
            }
            AgentCommand::Enqueue(Mutation::update(collection, id, parse_record(json)?))
        }
        "delete" => {
            let (collection, id) = split_word(rest);
            let collection = required(collection, "collection")?;
            let id = required(id, "id")?;
            AgentCommand::Enqueue(Mutation::delete(collection, id))
        }
        "call" => {
            let (procedure, json) = split_word(rest);
            let procedure = required(procedure, "procedure")?;
            let args = if json.is_empty() {
                Record::new()
            } else {
                parse_record(json)?
            };
            AgentCommand::Enqueue(Mutation::remote_call(procedure, args))
        }
        "drain" => AgentCommand::Drain,
        "clear" => AgentCommand::Clear,
        "status" => AgentCommand::Status,
        "quit" | "exit" => AgentCommand::Quit,
        other => return Err(Error::UnknownCommand(other.to_string())),
    };
    Ok(Some(command))
}

/// Splits off the first whitespace-delimited word.
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (s, ""),
    }
}

fn required(word: &str, field: &'static str) -> Result<String> {
    if word.is_empty() {
        Err(Error::FieldEmpty { field })
    } else {
        Ok(word.to_string())
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
