// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable storage for the pending operation list.
//!
//! The on-disk format is JSONL, one [`QueuedOperation`] per line. Every save
//! rewrites the whole list through a temp file that is fsynced and renamed
//! over the old one, so a crash mid-write leaves either the old or the new
//! list, never a torn one. The format is internal and not a compatibility
//! surface.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;
use ob_core::QueuedOperation;

const QUEUE_FILE_NAME: &str = "queue.jsonl";
const ABANDONED_FILE_NAME: &str = "abandoned.jsonl";
const LOCK_FILE_NAME: &str = "queue.lock";

/// Error type for queue storage.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored line could not be parsed.
    #[error("corrupt queue file at line {line}: {reason}")]
    Corrupt { line: usize, reason: String },

    /// Another process owns the queue directory.
    #[error("queue at {0} is in use by another process")]
    Locked(String),

    /// Injected failure (memory store).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for queue storage.
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence for the pending operation list.
///
/// Implementations must tolerate being called from any thread. Errors are
/// reported to the caller, which logs them; they never block a write.
pub trait QueueStore: Send + Sync {
    /// Loads the persisted list in queue order. An absent store is empty.
    fn load(&self) -> StoreResult<Vec<QueuedOperation>>;

    /// Replaces the persisted list.
    fn save(&self, ops: &[QueuedOperation]) -> StoreResult<()>;

    /// Records an operation dropped after exhausting its retries.
    fn record_abandoned(&self, _op: &QueuedOperation) -> StoreResult<()> {
        Ok(())
    }
}

/// File-backed store rooted in a state directory.
///
/// Holds an exclusive lock on `queue.lock` for its lifetime so two processes
/// never rewrite the same queue.
pub struct JsonlQueueStore {
    /// Path to the queue file.
    path: PathBuf,
    /// Path to the dead-letter log.
    abandoned_path: PathBuf,
    /// Held for the lifetime of the store; released on drop.
    _lock: File,
}

impl JsonlQueueStore {
    /// Opens (creating if needed) the store in `dir`.
    pub fn open(dir: &Path) -> StoreResult<Self> {
        fs::create_dir_all(dir)?;

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(dir.join(LOCK_FILE_NAME))?;
        lock.try_lock_exclusive()
            .map_err(|_| StoreError::Locked(dir.display().to_string()))?;

        Ok(JsonlQueueStore {
            path: dir.join(QUEUE_FILE_NAME),
            abandoned_path: dir.join(ABANDONED_FILE_NAME),
            _lock: lock,
        })
    }

    /// Path of the queue file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the dead-letter log.
    pub fn read_abandoned(&self) -> StoreResult<Vec<QueuedOperation>> {
        read_lines(&self.abandoned_path)
    }

    /// Moves an unreadable queue file aside so the next save doesn't bury it.
    fn quarantine(&self) -> Option<PathBuf> {
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S");
        let target = self.path.with_file_name(format!("queue.corrupt-{stamp}.jsonl"));
        fs::rename(&self.path, &target).ok().map(|_| target)
    }
}

impl QueueStore for JsonlQueueStore {
    /// Loads the queue file.
    ///
    /// A corrupt file is renamed to `queue.corrupt-<timestamp>.jsonl` before
    /// the error is returned.
    fn load(&self) -> StoreResult<Vec<QueuedOperation>> {
        match read_lines(&self.path) {
            Err(e @ StoreError::Corrupt { .. }) => {
                if let Some(moved) = self.quarantine() {
                    tracing::warn!("moved corrupt queue file to {}", moved.display());
                }
                Err(e)
            }
            other => other,
        }
    }

    fn save(&self, ops: &[QueuedOperation]) -> StoreResult<()> {
        let tmp = self.path.with_extension("jsonl.tmp");
        {
            let mut file = File::create(&tmp)?;
            for op in ops {
                let json = serde_json::to_string(op)?;
                writeln!(file, "{json}")?;
            }
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn record_abandoned(&self, op: &QueuedOperation) -> StoreResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.abandoned_path)?;

        let json = serde_json::to_string(op)?;
        writeln!(file, "{json}")?;
        file.sync_all()?;
        Ok(())
    }
}

/// Reads a JSONL file of operations, skipping blank lines.
fn read_lines(path: &Path) -> StoreResult<Vec<QueuedOperation>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut reader = BufReader::new(file);
    let mut ops = Vec::new();
    let mut buf = Vec::new();
    let mut line_no = 0;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;
        let corrupt = |reason: String| StoreError::Corrupt {
            line: line_no,
            reason,
        };
        let line = std::str::from_utf8(&buf).map_err(|e| corrupt(e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        let op = serde_json::from_str(line).map_err(|e| corrupt(e.to_string()))?;
        ops.push(op);
    }
    Ok(ops)
}

/// In-memory store for embedding and tests.
///
/// Survives "restarts" as long as the same instance is shared, and can be
/// told to fail saves.
#[derive(Default)]
pub struct MemoryQueueStore {
    ops: Mutex<Vec<QueuedOperation>>,
    abandoned: Mutex<Vec<QueuedOperation>>,
    fail_saves: Mutex<bool>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent saves fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        *self.fail_saves.lock().unwrap_or_else(|e| e.into_inner()) = fail;
    }

    /// Contents as last saved.
    pub fn saved(&self) -> Vec<QueuedOperation> {
        self.ops.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Operations recorded as abandoned.
    pub fn abandoned(&self) -> Vec<QueuedOperation> {
        self.abandoned
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl QueueStore for MemoryQueueStore {
    fn load(&self) -> StoreResult<Vec<QueuedOperation>> {
        Ok(self.saved())
    }

    fn save(&self, ops: &[QueuedOperation]) -> StoreResult<()> {
        if *self.fail_saves.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(StoreError::Unavailable("saves disabled".into()));
        }
        *self.ops.lock().unwrap_or_else(|e| e.into_inner()) = ops.to_vec();
        Ok(())
    }

    fn record_abandoned(&self, op: &QueuedOperation) -> StoreResult<()> {
        self.abandoned
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(op.clone());
        Ok(())
    }
}

impl<S: QueueStore + ?Sized> QueueStore for std::sync::Arc<S> {
    fn load(&self) -> StoreResult<Vec<QueuedOperation>> {
        (**self).load()
    }

    fn save(&self, ops: &[QueuedOperation]) -> StoreResult<()> {
        (**self).save(ops)
    }

    fn record_abandoned(&self, op: &QueuedOperation) -> StoreResult<()> {
        (**self).record_abandoned(op)
    }
}
