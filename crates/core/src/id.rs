// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Operation identifiers.
//!
//! An [`OpId`] is a hybrid logical timestamp: wall clock milliseconds plus a
//! logical counter plus a node id. Ids handed out by one [`IdClock`] are
//! strictly increasing, so sorting ids reproduces enqueue order even when
//! the wall clock stalls or steps backwards.
//!
//! Format: `{wall_ms}-{counter}-{node_id}`

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Error, Result};

/// Identifier of a queued operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpId {
    /// Wall clock time in milliseconds since Unix epoch.
    pub wall_ms: u64,
    /// Logical counter for ids minted within the same millisecond.
    pub counter: u32,
    /// Node identifier, keeps ids from different devices distinct.
    pub node_id: u32,
}

impl OpId {
    pub fn new(wall_ms: u64, counter: u32, node_id: u32) -> Self {
        OpId {
            wall_ms,
            counter,
            node_id,
        }
    }

    /// Parses an id from its string representation.
    pub fn parse(s: &str) -> Result<Self> {
        s.parse()
    }
}

impl Ord for OpId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.wall_ms
            .cmp(&other.wall_ms)
            .then_with(|| self.counter.cmp(&other.counter))
            .then_with(|| self.node_id.cmp(&other.node_id))
    }
}

impl PartialOrd for OpId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.wall_ms, self.counter, self.node_id)
    }
}

impl FromStr for OpId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split('-');
        let (Some(wall), Some(counter), Some(node), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(Error::InvalidOpId(format!(
                "expected 'wall_ms-counter-node_id', got '{s}'"
            )));
        };

        let wall_ms = wall
            .parse::<u64>()
            .map_err(|_| Error::InvalidOpId(format!("invalid wall_ms '{wall}' in '{s}'")))?;
        let counter = counter
            .parse::<u32>()
            .map_err(|_| Error::InvalidOpId(format!("invalid counter '{counter}' in '{s}'")))?;
        let node_id = node
            .parse::<u32>()
            .map_err(|_| Error::InvalidOpId(format!("invalid node_id '{node}' in '{s}'")))?;

        Ok(OpId::new(wall_ms, counter, node_id))
    }
}

/// Source of wall clock time, injectable for tests.
pub trait ClockSource: Send + Sync {
    /// Returns the current time in milliseconds since Unix epoch.
    fn now_ms(&self) -> u64;
}

/// Wall clock backed by `SystemTime`.
#[derive(Debug, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Mints strictly increasing [`OpId`]s.
pub struct IdClock<C: ClockSource = SystemClock> {
    clock: C,
    node_id: u32,
    last: Mutex<(u64, u32)>,
}

impl IdClock<SystemClock> {
    pub fn new(node_id: u32) -> Self {
        Self::with_clock(SystemClock, node_id)
    }
}

impl<C: ClockSource> IdClock<C> {
    pub fn with_clock(clock: C, node_id: u32) -> Self {
        IdClock {
            clock,
            node_id,
            last: Mutex::new((0, 0)),
        }
    }

    pub fn node_id(&self) -> u32 {
        self.node_id
    }

    /// Mints the next id.
    ///
    /// When the wall clock has not advanced past the last id, the previous
    /// wall time is kept and the counter is bumped instead.
    pub fn next(&self) -> OpId {
        let physical = self.clock.now_ms();
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());

        if physical > last.0 {
            *last = (physical, 0);
        } else {
            last.1 = last.1.saturating_add(1);
        }

        OpId::new(last.0, last.1, self.node_id)
    }

    /// Advances the clock past `seen` so later ids sort after it.
    ///
    /// Used after rehydrating a persisted queue, whose ids may be ahead of
    /// the local wall clock.
    pub fn observe(&self, seen: &OpId) {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if (seen.wall_ms, seen.counter) > *last {
            *last = (seen.wall_ms, seen.counter);
        }
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
