// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

use crate::sync::StoreError;

/// All possible errors that can occur in the obrs library.
///
/// Errors provide user-friendly messages with hints for common issues.
#[derive(Debug, Error)]
pub enum Error {
    #[error("already initialized at {0}")]
    AlreadyInitialized(String),

    #[error("invalid remote URL '{0}'\n  hint: use ws://host:port or wss://host:port")]
    InvalidRemoteUrl(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("{field} cannot be empty")]
    FieldEmpty { field: &'static str },

    #[error("unknown command '{0}'\n  hint: commands are create, update, delete, call, drain, clear, status, quit")]
    UnknownCommand(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("queue store error: {0}")]
    Store(#[from] StoreError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),
}

/// A specialized Result type for obrs operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<ob_core::Error> for Error {
    fn from(e: ob_core::Error) -> Self {
        match e {
            ob_core::Error::InvalidRecord(s) => Error::InvalidRecord(s),
            ob_core::Error::InvalidOpId(s) => Error::InvalidRecord(format!("bad op id: {}", s)),
            ob_core::Error::Io(e) => Error::Io(e),
            ob_core::Error::Json(e) => Error::InvalidRecord(e.to_string()),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
