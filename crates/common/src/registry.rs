//! Live mount registry
//!
//! Maps engine mount ids to what the controller needs when a mount
//! terminates: the configuration it came from and who to notify. The engine
//! stays the source of truth for whether a mount exists; the registry is the
//! source of truth for who to tell about it.
//!
//! Every access goes through one lock that is never held across a call into
//! the engine or a user callback.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::{MountId, MountInfo};

/// Called once when a mount terminates, with the engine result code
pub type MountCallback = Arc<dyn Fn(MountId, i32, &MountRecord, Option<&MountInfo>) + Send + Sync>;

pub struct MountRecord {
    config_path: PathBuf,
    on_complete: MountCallback,
}

impl MountRecord {
    pub fn new(config_path: PathBuf, on_complete: MountCallback) -> Self {
        Self {
            config_path,
            on_complete,
        }
    }

    /// Configuration file the mount was created from
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub(crate) fn notify(&self, mount_id: MountId, code: i32, info: Option<&MountInfo>) {
        (self.on_complete)(mount_id, code, self, info);
    }
}

impl fmt::Debug for MountRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountRecord")
            .field("config_path", &self.config_path)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("mount {0} is not registered")]
    NotFound(MountId),
}

#[derive(Debug, Default)]
pub struct MountRegistry {
    records: Mutex<HashMap<MountId, Arc<MountRecord>>>,
}

impl MountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly created mount, replacing any stale entry
    pub fn insert(&self, mount_id: MountId, record: MountRecord) {
        if let Some(stale) = self.records.lock().insert(mount_id, Arc::new(record)) {
            tracing::warn!(
                mount_id,
                config = %stale.config_path.display(),
                "replaced stale mount record"
            );
        }
    }

    pub fn get(&self, mount_id: MountId) -> Result<Arc<MountRecord>, RegistryError> {
        self.records
            .lock()
            .get(&mount_id)
            .cloned()
            .ok_or(RegistryError::NotFound(mount_id))
    }

    pub fn remove(&self, mount_id: MountId) -> Option<Arc<MountRecord>> {
        self.records.lock().remove(&mount_id)
    }

    /// Registered ids in ascending order
    pub fn ids(&self) -> Vec<MountId> {
        let mut ids: Vec<_> = self.records.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Drop every record, returning how many were dropped
    pub fn clear(&self) -> usize {
        let mut records = self.records.lock();
        let count = records.len();
        records.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn record(path: &str) -> MountRecord {
        MountRecord::new(PathBuf::from(path), Arc::new(|_, _, _, _| {}))
    }

    #[test]
    fn test_insert_get_remove() {
        let registry = MountRegistry::new();
        registry.insert(3, record("a.mfcfg"));
        registry.insert(1, record("b.mfcfg"));

        assert_eq!(registry.ids(), vec![1, 3]);
        assert_eq!(
            registry.get(3).unwrap().config_path(),
            Path::new("a.mfcfg")
        );
        assert!(registry.remove(3).is_some());
        assert_eq!(registry.get(3).unwrap_err(), RegistryError::NotFound(3));
        assert!(registry.remove(3).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_notify_passes_record() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let record = MountRecord::new(
            PathBuf::from("c.mfcfg"),
            Arc::new(move |id, code, record, info| {
                assert_eq!((id, code), (7, 0));
                assert_eq!(record.config_path(), Path::new("c.mfcfg"));
                assert!(info.is_none());
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        record.notify(7, 0, None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clear_counts() {
        let registry = MountRegistry::new();
        registry.insert(1, record("a"));
        registry.insert(2, record("b"));
        assert_eq!(registry.clear(), 2);
        assert!(registry.is_empty());
    }
}
