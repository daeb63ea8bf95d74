// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;

use crate::config::init_state_dir;
use crate::error::Result;

pub fn run(state_dir: &Path, remote: Option<String>) -> Result<()> {
    let config = init_state_dir(state_dir, remote)?;

    println!("Initialized outbox at {}", state_dir.display());
    println!("Remote: {}", config.remote.url);
    println!("Node: {}", config.sync.node_id);
    Ok(())
}
