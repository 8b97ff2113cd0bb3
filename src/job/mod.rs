//! Background task execution (spec §4.10). Workers run on the tokio
//! runtime the same way the teacher's per-connection tasks do (compare
//! `VfsTask::spawn`/`run` in `src/vfs_task.rs`): a struct holding the
//! channel endpoints, a `spawn` constructor, and an owned `run` loop.

pub mod file_ops;
pub mod grep;
pub mod search;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_channel::{Receiver, Sender};
use whirlwind::ShardMap;

use crate::error::{ErrorKind, Result, TfmError};
use crate::path::Path;

/// Cooperative cancellation signal, checked at suspension points
/// (directory boundaries, before file ops — spec §4.10 "Cancellation").
/// Hand-rolled on top of `tokio::sync::Notify` since the crate has no
/// other use for a full `tokio-util` dependency.
#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<tokio::sync::Notify>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self { cancelled: Arc::new(AtomicBool::new(false)), notify: Arc::new(tokio::sync::Notify::new()) }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `Cancelled` if this token has already been tripped; the
    /// idiomatic call at a suspension point (spec: "observable at every
    /// directory boundary and before each file operation").
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(TfmError::new(ErrorKind::Cancelled, "task superseded or cancelled"))
        } else {
            Ok(())
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Search,
    Grep,
    Copy,
    Move,
    Delete,
    ArchiveCreate,
    ArchiveExtract,
}

/// Identifies a running task for at-most-one-per-fingerprint scheduling
/// (spec §4.10 "at most one task per (kind, root)").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobFingerprint {
    pub kind: JobKind,
    pub root: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

#[derive(Debug, Clone)]
pub struct ItemError {
    pub item: String,
    pub message: String,
}

/// Progress updates published to anyone watching a job; `done` is
/// strictly monotonic for a given `JobId` (spec §8 invariant I9).
#[derive(Debug, Clone)]
pub struct Progress {
    pub job_id: JobId,
    pub done: u64,
    pub total: Option<u64>,
    pub current_item: Option<String>,
    pub errors: Vec<ItemError>,
    pub finished: bool,
}

pub struct JobHandle {
    pub id: JobId,
    pub cancel: CancelToken,
    pub progress: Receiver<Progress>,
}

/// Runs and tracks background tasks, enforcing the at-most-one-per-
/// fingerprint scheduling rule by cancelling and replacing a prior job
/// sharing the same `(kind, root)` (spec §4.10 "Scheduling model").
pub struct JobRunner {
    next_id: std::sync::atomic::AtomicU64,
    active: ShardMap<JobFingerprint, (JobId, CancelToken)>,
}

impl JobRunner {
    pub fn new() -> Self {
        Self { next_id: std::sync::atomic::AtomicU64::new(0), active: ShardMap::new() }
    }

    fn alloc_id(&self) -> JobId {
        JobId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Cancels any job already running under `fingerprint`, registers the
    /// new one, and returns its id, cancel token, and progress channel.
    /// Callers spawn the actual work with these.
    pub async fn begin(&self, fingerprint: JobFingerprint) -> (JobId, CancelToken, Sender<Progress>, Receiver<Progress>) {
        if let Some((_, (_, prior_cancel))) = self.active.remove(&fingerprint).await {
            prior_cancel.cancel();
        }
        let id = self.alloc_id();
        let cancel = CancelToken::new();
        self.active.insert(fingerprint, (id, cancel.clone())).await;
        let (tx, rx) = async_channel::unbounded();
        (id, cancel, tx, rx)
    }

    pub async fn finish(&self, fingerprint: &JobFingerprint, id: JobId) {
        // Only remove our own registration: a newer job may already have
        // replaced this fingerprint's entry by the time we finish.
        if let Some(current) = self.active.get(fingerprint).await {
            if current.0 == id {
                self.active.remove(fingerprint).await;
            }
        }
    }
}

impl Default for JobRunner {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn fingerprint_root(path: &Path) -> String {
    path.as_uri()
}
