// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for ob-core operations.

use thiserror::Error;

/// Errors raised by the shared outbox data model.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid operation id: {0}")]
    InvalidOpId(String),

    #[error("invalid record: {0}\n  hint: records and field sets must be JSON objects")]
    InvalidRecord(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for ob-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
