// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Commands that queue a mutation.
//!
//! The operation is durable before anything touches the network. Unless
//! `--no-sync` is given, one probe decides whether to try a drain right
//! away; an unreachable backend just leaves the work queued.

use ob_core::{parse_record, Mutation, Record};

use super::{print_outcome, Context};
use crate::cli::SyncArgs;
use crate::error::Result;

pub async fn create(ctx: &Context, collection: String, record: &str, sync: SyncArgs) -> Result<()> {
    let record = parse_record(record)?;
    submit(ctx, Mutation::create(collection, record), sync).await
}

pub async fn update(
    ctx: &Context,
    collection: String,
    id: String,
    fields: &str,
    sync: SyncArgs,
) -> Result<()> {
    let fields = parse_record(fields)?;
    submit(ctx, Mutation::update(collection, id, fields), sync).await
}

pub async fn delete(ctx: &Context, collection: String, id: String, sync: SyncArgs) -> Result<()> {
    submit(ctx, Mutation::delete(collection, id), sync).await
}

pub async fn call(
    ctx: &Context,
    procedure: String,
    args: Option<&str>,
    sync: SyncArgs,
) -> Result<()> {
    let args = match args {
        Some(json) => parse_record(json)?,
        None => Record::new(),
    };
    submit(ctx, Mutation::remote_call(procedure, args), sync).await
}

async fn submit(ctx: &Context, mutation: Mutation, sync: SyncArgs) -> Result<()> {
    let id = ctx.engine.enqueue(mutation);
    println!("Queued {}", id);

    if sync.no_sync {
        return Ok(());
    }
    if ctx.probe().await.is_online() {
        let outcome = ctx.engine.force_drain_now().await;
        print_outcome(&outcome, ctx.engine.status().queue_length);
    } else {
        tracing::debug!("backend unreachable, leaving {} queued", id);
        println!("Offline, {} pending.", ctx.engine.status().queue_length);
    }
    Ok(())
}
