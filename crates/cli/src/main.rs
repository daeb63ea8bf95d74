// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use clap::Parser;
use obrs::{Cli, Command};

fn main() {
    let cli = Cli::parse();
    setup_logging(&cli);
    if let Err(e) = obrs::run(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

/// Logs go to stderr so command output stays parseable. `RUST_LOG` wins
/// over the defaults.
fn setup_logging(cli: &Cli) {
    use tracing_subscriber::EnvFilter;

    let default = if cli.verbose {
        "debug"
    } else if matches!(cli.command, Command::Run { .. }) {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
