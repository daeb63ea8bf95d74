// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;

#[test]
fn test_error_already_initialized_display() {
    let err = Error::AlreadyInitialized("/path/to/state".to_string());
    assert!(err.to_string().contains("already initialized"));
    assert!(err.to_string().contains("/path/to/state"));
}

#[test]
fn test_error_invalid_remote_url_has_hint() {
    let err = Error::InvalidRemoteUrl("http://x".to_string());
    assert!(err.to_string().contains("http://x"));
    assert!(err.to_string().contains("hint: use ws://"));
}

#[test]
fn test_error_unknown_command_lists_commands() {
    let err = Error::UnknownCommand("frob".to_string());
    assert!(err.to_string().contains("frob"));
    assert!(err.to_string().contains("create, update, delete"));
}

#[test]
fn test_from_store_error() {
    let err: Error = StoreError::Locked("/q".to_string()).into();
    assert!(matches!(err, Error::Store(_)));
    assert!(err.to_string().contains("in use by another process"));
}

#[test]
fn test_from_core_invalid_record() {
    let core = ob_core::parse_record("[1]").unwrap_err();
    let err: Error = core.into();
    assert!(matches!(err, Error::InvalidRecord(_)));
}

#[test]
fn test_from_core_malformed_json() {
    let core = ob_core::parse_record("{oops").unwrap_err();
    let err: Error = core.into();
    assert!(err.to_string().starts_with("invalid record"));
}
