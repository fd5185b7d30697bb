//! Cross-thread queues drained by the event loop
//!
//! [`ArgQueue`] collects argument batches from this process's own start-up
//! and from relayed launches. [`ErrorQueue`] collects mount failures from
//! both the synchronous mount path and engine completions. Each drain takes
//! the whole queue under a single lock acquisition.

use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;

use parking_lot::Mutex;

/// One launch's argument list; position 0 is the launching executable
pub type ArgBatch = Vec<String>;

#[derive(Debug, Default)]
pub struct ArgQueue {
    batches: Mutex<VecDeque<ArgBatch>>,
}

impl ArgQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, batch: ArgBatch) {
        let mut batches = self.batches.lock();
        batches.push_back(batch);
        tracing::debug!(pending = batches.len(), "queued argument batch");
    }

    /// Take every queued batch, leaving the queue empty
    pub fn drain(&self) -> Vec<ArgBatch> {
        self.batches.lock().drain(..).collect()
    }

    /// Take every queued batch and flatten it to the paths to mount
    ///
    /// Batches come out in arrival order; the executable path at position 0
    /// of each batch is skipped.
    pub fn drain_paths(&self) -> Vec<String> {
        self.drain()
            .into_iter()
            .flat_map(|batch| batch.into_iter().skip(1))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.lock().is_empty()
    }
}

/// A failed mount attempt waiting to be reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountErrorRecord {
    pub config_path: PathBuf,
    /// Empty when the failure happened before a mount point was known
    pub mount_point: String,
    pub reason: String,
    /// Reported by an engine completion rather than the mount call
    pub from_completion: bool,
}

impl fmt::Display for MountErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to mount \"{}\"", self.config_path.display())?;
        if !self.mount_point.is_empty() {
            write!(f, " into \"{}\"", self.mount_point)?;
        }
        write!(f, ":\n  {}", self.reason)
    }
}

#[derive(Debug, Default)]
pub struct ErrorQueue {
    records: Mutex<Vec<MountErrorRecord>>,
}

impl ErrorQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, record: MountErrorRecord) {
        tracing::warn!(
            config = %record.config_path.display(),
            mount_point = %record.mount_point,
            from_completion = record.from_completion,
            "mount failed: {}",
            record.reason
        );
        self.records.lock().push(record);
    }

    pub fn drain(&self) -> Vec<MountErrorRecord> {
        std::mem::take(&mut *self.records.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}
