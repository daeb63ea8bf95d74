// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::list::print_ops;
use super::Context;
use crate::cli::OutputFormat;
use crate::error::Result;

/// Shows the dead-letter log, oldest first.
pub fn run(ctx: &Context, output: OutputFormat) -> Result<()> {
    let ops = ctx.store.read_abandoned()?;
    print_ops(&ops, output, "No abandoned operations.")
}
