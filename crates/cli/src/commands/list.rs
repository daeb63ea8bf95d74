// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use ob_core::QueuedOperation;

use super::Context;
use crate::cli::OutputFormat;
use crate::error::Result;

pub fn run(ctx: &Context, output: OutputFormat) -> Result<()> {
    print_ops(&ctx.engine.pending(), output, "No pending operations.")
}

/// Prints operations in queue order, one per line, or as a JSON array.
pub(super) fn print_ops(ops: &[QueuedOperation], output: OutputFormat, empty: &str) -> Result<()> {
    match output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(ops)?);
        }
        OutputFormat::Text => {
            if ops.is_empty() {
                println!("{}", empty);
            }
            for op in ops {
                println!("{}", format_op_line(op));
            }
        }
    }
    Ok(())
}

pub(super) fn format_op_line(op: &QueuedOperation) -> String {
    let mut line = format!("{}  {}", op, op.enqueued_at.format("%Y-%m-%d %H:%M:%S"));
    if op.attempts > 0 {
        line.push_str(&format!("  ({} failed)", op.attempts));
    }
    line
}

#[cfg(test)]
#[path = "list_tests.rs"]
mod tests;
