// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::{print_outcome, Context};
use crate::error::Result;

pub async fn run(ctx: &Context) -> Result<()> {
    ctx.probe().await;
    let outcome = ctx.engine.force_drain_now().await;
    print_outcome(&outcome, ctx.engine.status().queue_length);
    Ok(())
}
