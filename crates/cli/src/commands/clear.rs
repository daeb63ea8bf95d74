// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::Context;
use crate::error::Result;

pub fn run(ctx: &Context) -> Result<()> {
    let dropped = ctx.engine.clear_queue();
    println!("Cleared {} pending operations.", dropped);
    Ok(())
}
