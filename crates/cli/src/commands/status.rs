// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::Context;
use crate::cli::OutputFormat;
use crate::error::Result;
use crate::sync::SyncStatus;

/// Probes once, then reports the status a running agent would show.
pub async fn run(ctx: &Context, output: OutputFormat) -> Result<()> {
    let connectivity = ctx.probe().await;
    let status = SyncStatus::derive(connectivity, false, ctx.engine.pending().len(), None);

    match output {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "remote": ctx.config.remote.url,
                "state_dir": ctx.state_dir,
                "status": status,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            println!("Remote: {}", ctx.config.remote.url);
            println!("Connectivity: {}", status.connectivity);
            println!("Phase: {}", status.phase);
            println!("Pending ops: {}", status.queue_length);
        }
    }
    Ok(())
}
