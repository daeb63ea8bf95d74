// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket protocol between the outbox client and a record store server.
//!
//! Request/response: every client request carries a `request_id` that the
//! server echoes in its reply. A request is either acknowledged (applied) or
//! rejected (the server refuses it and will keep refusing it).

use serde::{Deserialize, Serialize};

use crate::op::{Mutation, Record};

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Insert (or overwrite) a record.
    Insert {
        request_id: u64,
        collection: String,
        record: Record,
    },

    /// Merge fields into an existing record.
    Patch {
        request_id: u64,
        collection: String,
        id: String,
        fields: Record,
    },

    /// Remove a record.
    Remove {
        request_id: u64,
        collection: String,
        id: String,
    },

    /// Invoke a named procedure.
    Invoke {
        request_id: u64,
        procedure: String,
        args: Record,
    },

    /// Keepalive.
    Ping { id: u64 },
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The request was applied.
    Ack {
        request_id: u64,
        /// Procedure result for `invoke`, absent otherwise.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<serde_json::Value>,
    },

    /// The request was refused by validation; retrying will not help.
    Rejected { request_id: u64, reason: String },

    /// Pong response to client Ping.
    Pong { id: u64 },

    /// The server failed to process a request (storage error, malformed frame).
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<u64>,
        message: String,
    },
}

impl ClientMessage {
    /// Builds the request that applies `mutation`.
    pub fn for_mutation(request_id: u64, mutation: &Mutation) -> Self {
        match mutation {
            Mutation::Create { collection, record } => ClientMessage::Insert {
                request_id,
                collection: collection.clone(),
                record: record.clone(),
            },
            Mutation::Update {
                collection,
                id,
                fields,
            } => ClientMessage::Patch {
                request_id,
                collection: collection.clone(),
                id: id.clone(),
                fields: fields.clone(),
            },
            Mutation::Delete { collection, id } => ClientMessage::Remove {
                request_id,
                collection: collection.clone(),
                id: id.clone(),
            },
            Mutation::RemoteCall { procedure, args } => ClientMessage::Invoke {
                request_id,
                procedure: procedure.clone(),
                args: args.clone(),
            },
        }
    }

    pub fn ping(id: u64) -> Self {
        ClientMessage::Ping { id }
    }

    /// Request id this message expects a reply for.
    pub fn request_id(&self) -> u64 {
        match self {
            ClientMessage::Insert { request_id, .. }
            | ClientMessage::Patch { request_id, .. }
            | ClientMessage::Remove { request_id, .. }
            | ClientMessage::Invoke { request_id, .. } => *request_id,
            ClientMessage::Ping { id } => *id,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    pub fn ack(request_id: u64) -> Self {
        ServerMessage::Ack {
            request_id,
            result: None,
        }
    }

    pub fn ack_with(request_id: u64, result: serde_json::Value) -> Self {
        ServerMessage::Ack {
            request_id,
            result: Some(result),
        }
    }

    pub fn rejected(request_id: u64, reason: impl Into<String>) -> Self {
        ServerMessage::Rejected {
            request_id,
            reason: reason.into(),
        }
    }

    pub fn pong(id: u64) -> Self {
        ServerMessage::Pong { id }
    }

    pub fn error(request_id: Option<u64>, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            request_id,
            message: message.into(),
        }
    }

    /// Request id this message answers, if any.
    pub fn request_id(&self) -> Option<u64> {
        match self {
            ServerMessage::Ack { request_id, .. } | ServerMessage::Rejected { request_id, .. } => {
                Some(*request_id)
            }
            ServerMessage::Pong { id } => Some(*id),
            ServerMessage::Error { request_id, .. } => *request_id,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
