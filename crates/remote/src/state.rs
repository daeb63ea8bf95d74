// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Server state management.
//!
//! Records live in one SQLite table keyed by `(collection, id)`, with the
//! body stored as JSON text.

use std::path::Path;
use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use tokio::sync::Mutex;

use ob_core::Record;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    body TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    PRIMARY KEY (collection, id)
);
"#;

/// Errors from applying a request.
#[derive(Debug, Error)]
pub enum StateError {
    /// The request is invalid and will stay invalid.
    #[error("{0}")]
    Rejected(String),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StateError>;

fn reject<T>(reason: impl Into<String>) -> Result<T> {
    Err(StateError::Rejected(reason.into()))
}

/// Shared handle to the record database.
#[derive(Clone)]
pub struct ServerState {
    conn: Arc<Mutex<Connection>>,
}

impl ServerState {
    /// Opens (creating if needed) `records.db` in `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let conn = Connection::open(data_dir.join("records.db"))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(ServerState {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Writes a full record, replacing any record with the same id.
    ///
    /// Replays of the same insert leave the same state behind.
    pub async fn insert(&self, collection: &str, record: &Record) -> Result<()> {
        check_collection(collection)?;
        let id = match record.get("id").and_then(|v| v.as_str()) {
            Some(id) if !id.is_empty() => id,
            _ => return reject("record needs a non-empty string \"id\""),
        };
        let body = serde_json::to_string(record)?;

        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO records (collection, id, body) VALUES (?1, ?2, ?3)
             ON CONFLICT (collection, id) DO UPDATE SET
                 body = excluded.body,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
            params![collection, id, body],
        )?;
        Ok(())
    }

    /// Merges `fields` into an existing record. The `id` field cannot change.
    pub async fn patch(&self, collection: &str, id: &str, fields: &Record) -> Result<()> {
        check_collection(collection)?;
        let conn = self.conn.lock().await;
        let Some(mut record) = read(&conn, collection, id)? else {
            return reject(format!("no record {}/{}", collection, id));
        };

        for (key, value) in fields {
            if key != "id" {
                record.insert(key.clone(), value.clone());
            }
        }
        conn.execute(
            "UPDATE records SET body = ?3, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
             WHERE collection = ?1 AND id = ?2",
            params![collection, id, serde_json::to_string(&record)?],
        )?;
        Ok(())
    }

    /// Deletes a record. Removing a missing record succeeds.
    pub async fn remove(&self, collection: &str, id: &str) -> Result<()> {
        check_collection(collection)?;
        let conn = self.conn.lock().await;
        conn.execute(
            "DELETE FROM records WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )?;
        Ok(())
    }

    /// Runs a built-in procedure.
    ///
    /// - `ping` returns `"pong"`
    /// - `count {"collection": name}` returns the number of records
    pub async fn invoke(&self, procedure: &str, args: &Record) -> Result<serde_json::Value> {
        match procedure {
            "ping" => Ok(serde_json::Value::from("pong")),
            "count" => {
                let Some(collection) = args.get("collection").and_then(|v| v.as_str()) else {
                    return reject("count needs a string \"collection\"");
                };
                Ok(serde_json::Value::from(self.count(collection).await?))
            }
            "" => reject("procedure name cannot be empty"),
            other => reject(format!("unknown procedure '{}'", other)),
        }
    }

    /// Reads one record.
    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>> {
        let conn = self.conn.lock().await;
        read(&conn, collection, id)
    }

    /// Number of records in `collection`.
    pub async fn count(&self, collection: &str) -> Result<i64> {
        let conn = self.conn.lock().await;
        let n = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(n)
    }
}

fn check_collection(collection: &str) -> Result<()> {
    if collection.trim().is_empty() {
        reject("collection cannot be empty")
    } else {
        Ok(())
    }
}

fn read(conn: &Connection, collection: &str, id: &str) -> Result<Option<Record>> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM records WHERE collection = ?1 AND id = ?2",
            params![collection, id],
            |row| row.get(0),
        )
        .optional()?;
    match body {
        Some(body) => Ok(Some(serde_json::from_str(&body)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
