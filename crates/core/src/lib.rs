// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! ob-core: Shared data model for the outbox sync engine.
//!
//! This crate provides the queued operation types, the id clock that orders
//! them, and the wire protocol spoken between the outbox client and a
//! record store server.

pub mod error;
pub mod id;
pub mod op;
pub mod protocol;

pub use error::{Error, Result};
pub use id::{ClockSource, IdClock, OpId, SystemClock};
pub use op::{parse_record, Mutation, OpKind, QueuedOperation, Record};
