// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Queued mutations.
//!
//! Every write a client performs is captured as a [`QueuedOperation`]: a
//! [`Mutation`] against the remote record store plus the bookkeeping the sync
//! engine needs (id, enqueue time, failed attempts).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::id::OpId;

/// A record body or field set, as a JSON object.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Parses a JSON object into a [`Record`].
pub fn parse_record(json: &str) -> Result<Record> {
    match serde_json::from_str(json)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(Error::InvalidRecord(format!(
            "expected an object, got {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// The four kinds of mutation the remote backend understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Create,
    Update,
    Delete,
    RemoteCall,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OpKind::Create => "create",
            OpKind::Update => "update",
            OpKind::Delete => "delete",
            OpKind::RemoteCall => "call",
        };
        f.write_str(s)
    }
}

/// The mutation carried by a queued operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mutation {
    /// Insert a full record into a collection.
    Create { collection: String, record: Record },

    /// Patch the given fields of an existing record.
    Update {
        collection: String,
        id: String,
        fields: Record,
    },

    /// Remove a record by id.
    Delete { collection: String, id: String },

    /// Invoke a named remote procedure.
    RemoteCall { procedure: String, args: Record },
}

impl Mutation {
    pub fn create(collection: impl Into<String>, record: Record) -> Self {
        Mutation::Create {
            collection: collection.into(),
            record,
        }
    }

    pub fn update(collection: impl Into<String>, id: impl Into<String>, fields: Record) -> Self {
        Mutation::Update {
            collection: collection.into(),
            id: id.into(),
            fields,
        }
    }

    pub fn delete(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Mutation::Delete {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn remote_call(procedure: impl Into<String>, args: Record) -> Self {
        Mutation::RemoteCall {
            procedure: procedure.into(),
            args,
        }
    }

    pub fn kind(&self) -> OpKind {
        match self {
            Mutation::Create { .. } => OpKind::Create,
            Mutation::Update { .. } => OpKind::Update,
            Mutation::Delete { .. } => OpKind::Delete,
            Mutation::RemoteCall { .. } => OpKind::RemoteCall,
        }
    }

    /// Collection name, or procedure name for remote calls.
    pub fn target(&self) -> &str {
        match self {
            Mutation::Create { collection, .. }
            | Mutation::Update { collection, .. }
            | Mutation::Delete { collection, .. } => collection,
            Mutation::RemoteCall { procedure, .. } => procedure,
        }
    }

    /// Id of the record affected, if the mutation addresses one.
    pub fn record_id(&self) -> Option<&str> {
        match self {
            Mutation::Create { record, .. } => record.get("id").and_then(|v| v.as_str()),
            Mutation::Update { id, .. } | Mutation::Delete { id, .. } => Some(id),
            Mutation::RemoteCall { .. } => None,
        }
    }
}

/// A pending mutation waiting to be applied to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedOperation {
    pub id: OpId,
    pub mutation: Mutation,
    /// When the operation was queued. Diagnostic only; queue position is
    /// the ordering authority.
    pub enqueued_at: DateTime<Utc>,
    /// Failed execution attempts so far.
    #[serde(default)]
    pub attempts: u32,
}

impl QueuedOperation {
    pub fn new(id: OpId, mutation: Mutation, enqueued_at: DateTime<Utc>) -> Self {
        QueuedOperation {
            id,
            mutation,
            enqueued_at,
            attempts: 0,
        }
    }

    pub fn kind(&self) -> OpKind {
        self.mutation.kind()
    }

    pub fn target(&self) -> &str {
        self.mutation.target()
    }
}

impl fmt::Display for QueuedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.id, self.kind(), self.target())?;
        if let Some(record_id) = self.mutation.record_id() {
            write!(f, "/{record_id}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "op_tests.rs"]
mod tests;
