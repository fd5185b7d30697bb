//! In-process engine
//!
//! Behaves like the native engine as far as the controller can observe:
//! identifiers are the lowest unused value starting at 1, completion handlers
//! fire exactly once from a worker thread after the mount call returned, and
//! failures carry the same native error codes. A terminated mount's id stays
//! reserved until its handler has returned. Tests can inject failures and
//! terminate mounts with an arbitrary result code.
//!
//! Mounts without sources are rejected. Plugin probing is not modelled: a
//! source that names no plugin file is attributed to the first loaded plugin,
//! or to [`PLUGIN_ID_NULL`] when none is loaded, where the native engine asks
//! each plugin whether it supports the source and rejects the mount if none
//! does.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use super::{
    CompletionHandler, Engine, EngineError, ErrorCode, MountId, MountInfo, MountSourceInfo,
    PluginId, PluginInfo, PLUGIN_ID_NULL,
};
use crate::config::MountSpec;

struct LiveMount {
    info: MountInfo,
    handler: CompletionHandler,
    working_dir: Option<PathBuf>,
}

#[derive(Default)]
struct State {
    plugins: BTreeMap<PluginId, PluginInfo>,
    /// Lookup order used when a source names no plugin
    plugin_order: Vec<PluginId>,
    mounts: BTreeMap<MountId, LiveMount>,
    /// Terminated mounts whose handler has not returned yet
    completing: BTreeSet<MountId>,
    next_mount_failure: Option<EngineError>,
    completions: Vec<JoinHandle<()>>,
}

impl State {
    /// Move a live mount to `completing` and run its handler on a worker
    fn dispatch_completion(
        &mut self,
        shared: &Arc<Mutex<State>>,
        mount_id: MountId,
        mount: LiveMount,
        code: i32,
    ) {
        self.completing.insert(mount_id);
        let shared = shared.clone();
        let handle = std::thread::spawn(move || {
            (mount.handler)(mount_id, Some(&mount.info), code);
            shared.lock().completing.remove(&mount_id);
        });
        self.completions.push(handle);
    }
}

/// Engine that keeps every mount in memory
#[derive(Default)]
pub struct MemoryEngine {
    state: Arc<Mutex<State>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `mount` call fail with `err`
    pub fn fail_next_mount(&self, err: EngineError) {
        self.state.lock().next_mount_failure = Some(err);
    }

    /// Terminate a live mount as if the filesystem loop returned `code`
    ///
    /// The mount disappears from enumeration immediately; its completion
    /// handler runs on a worker thread. Use [`MemoryEngine::wait_idle`] to
    /// wait for it.
    pub fn complete(&self, mount_id: MountId, code: i32) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let mount = state
            .mounts
            .remove(&mount_id)
            .ok_or(EngineError::new(ErrorCode::InvalidMountId))?;
        state.dispatch_completion(&self.state, mount_id, mount, code);
        Ok(())
    }

    /// Block until every completion handler dispatched so far has returned
    pub fn wait_idle(&self) {
        loop {
            let pending = std::mem::take(&mut self.state.lock().completions);
            if pending.is_empty() {
                return;
            }
            for handle in pending {
                if handle.join().is_err() {
                    tracing::warn!("completion handler panicked");
                }
            }
        }
    }

    /// Working directory observed when `mount_id` was mounted
    pub fn mount_dir(&self, mount_id: MountId) -> Option<PathBuf> {
        self.state
            .lock()
            .mounts
            .get(&mount_id)
            .and_then(|mount| mount.working_dir.clone())
    }

    fn resolve_plugin(state: &State, filename: Option<&str>) -> Result<PluginId, EngineError> {
        let Some(filename) = filename else {
            return Ok(state
                .plugin_order
                .first()
                .copied()
                .unwrap_or(PLUGIN_ID_NULL));
        };
        let wanted = Path::new(filename);
        state
            .plugins
            .iter()
            .find(|(_, info)| {
                info.filename == wanted
                    || info
                        .basename()
                        .eq_ignore_ascii_case(&wanted.to_string_lossy())
            })
            .map(|(id, _)| *id)
            .ok_or(EngineError::new(ErrorCode::InexistentPlugin))
    }
}

fn lowest_unused(taken: impl Fn(u32) -> bool) -> u32 {
    let mut candidate = 1;
    while taken(candidate) {
        candidate += 1;
    }
    candidate
}

impl Engine for MemoryEngine {
    fn add_plugin(&self, path: &Path, front: bool) -> Result<PluginId, EngineError> {
        if !path.is_file() {
            return Err(EngineError::new(ErrorCode::InexistentFile));
        }
        let mut state = self.state.lock();
        if state.plugins.values().any(|info| info.filename == path) {
            return Err(EngineError::new(ErrorCode::AlreadyExistingPlugin));
        }

        let plugin_id = lowest_unused(|id| state.plugins.contains_key(&id));
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        state.plugins.insert(
            plugin_id,
            PluginInfo {
                filename: path.to_path_buf(),
                name,
                description: "in-memory source plugin".to_string(),
                version: 0x0001_0000,
                version_string: "1.0.0".to_string(),
                guid: format!("{{00000000-0000-0000-0000-{:012X}}}", plugin_id),
                interface_version: 1,
            },
        );
        if front {
            state.plugin_order.insert(0, plugin_id);
        } else {
            state.plugin_order.push(plugin_id);
        }
        Ok(plugin_id)
    }

    fn remove_plugin(&self, plugin_id: PluginId) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if state.plugins.remove(&plugin_id).is_none() {
            return Err(EngineError::new(ErrorCode::InvalidPluginId));
        }
        state.plugin_order.retain(|id| *id != plugin_id);
        Ok(())
    }

    fn plugin_ids(&self) -> Result<Vec<PluginId>, EngineError> {
        Ok(self.state.lock().plugins.keys().copied().collect())
    }

    fn plugin_info(&self, plugin_id: PluginId) -> Result<PluginInfo, EngineError> {
        self.state
            .lock()
            .plugins
            .get(&plugin_id)
            .cloned()
            .ok_or(EngineError::new(ErrorCode::InvalidPluginId))
    }

    fn mount(
        &self,
        spec: &MountSpec,
        on_complete: CompletionHandler,
    ) -> Result<MountId, EngineError> {
        let working_dir = std::env::current_dir().ok();
        let mut state = self.state.lock();

        if let Some(err) = state.next_mount_failure.take() {
            return Err(err);
        }
        if spec.mount_point.is_empty() {
            return Err(EngineError::new(ErrorCode::InvalidMountPoint));
        }
        if spec.sources.is_empty() {
            return Err(EngineError::new(ErrorCode::InvalidParameter));
        }
        if state
            .mounts
            .values()
            .any(|mount| mount.info.mount_point.eq_ignore_ascii_case(&spec.mount_point))
        {
            return Err(EngineError::new(ErrorCode::AlreadyExistingMountPoint));
        }

        let mut sources = Vec::with_capacity(spec.sources.len());
        for source in &spec.sources {
            sources.push(MountSourceInfo {
                source: source.source.clone(),
                plugin_id: Self::resolve_plugin(&state, source.plugin_filename.as_deref())?,
                options: source.plugin_options.clone().unwrap_or_default(),
            });
        }

        let mount_id =
            lowest_unused(|id| state.mounts.contains_key(&id) || state.completing.contains(&id));
        state.mounts.insert(
            mount_id,
            LiveMount {
                info: MountInfo {
                    mount_point: spec.mount_point.clone(),
                    writable: spec.writable,
                    metadata: spec.metadata.clone(),
                    defer_copy_enabled: spec.defer_copy_enabled,
                    case_sensitive: spec.case_sensitive,
                    sources,
                },
                handler: on_complete,
                working_dir,
            },
        );
        Ok(mount_id)
    }

    fn mount_ids(&self) -> Result<Vec<MountId>, EngineError> {
        Ok(self.state.lock().mounts.keys().copied().collect())
    }

    fn mount_info(&self, mount_id: MountId) -> Result<MountInfo, EngineError> {
        self.state
            .lock()
            .mounts
            .get(&mount_id)
            .map(|mount| mount.info.clone())
            .ok_or(EngineError::new(ErrorCode::InvalidMountId))
    }

    fn unmount(&self, mount_id: MountId, _safe: bool) -> Result<(), EngineError> {
        self.complete(mount_id, 0)
    }

    fn unmount_all(&self, _safe: bool) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let mounts = std::mem::take(&mut state.mounts);
        for (mount_id, mount) in mounts {
            state.dispatch_completion(&self.state, mount_id, mount, 0);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::config::SourceSpec;

    fn spec(mount_point: &str) -> MountSpec {
        MountSpec {
            mount_point: mount_point.to_string(),
            metadata: "meta.db".to_string(),
            writable: true,
            defer_copy_enabled: true,
            case_sensitive: false,
            sources: vec![SourceSpec {
                source: "a".to_string(),
                plugin_filename: None,
                plugin_options: None,
            }],
        }
    }

    fn noop() -> CompletionHandler {
        Arc::new(|_, _, _| {})
    }

    #[test]
    fn test_mount_ids_reuse_lowest_free() {
        let engine = MemoryEngine::new();
        let first = engine.mount(&spec("M:"), noop()).unwrap();
        let second = engine.mount(&spec("N:"), noop()).unwrap();
        assert_eq!((first, second), (1, 2));

        engine.unmount(first, true).unwrap();
        engine.wait_idle();
        assert_eq!(engine.mount_ids().unwrap(), vec![2]);
        assert_eq!(engine.mount(&spec("O:"), noop()).unwrap(), 1);
    }

    #[test]
    fn test_id_stays_reserved_while_handler_runs() {
        let engine = MemoryEngine::new();
        let (entered_tx, entered_rx) = flume::bounded(1);
        let (release_tx, release_rx) = flume::bounded::<()>(1);
        let handler: CompletionHandler = Arc::new(move |_, _, _| {
            entered_tx.send(()).unwrap();
            release_rx.recv().unwrap();
        });
        let first = engine.mount(&spec("M:"), handler).unwrap();
        engine.complete(first, 0).unwrap();
        entered_rx.recv().unwrap();

        assert_eq!(engine.mount(&spec("N:"), noop()).unwrap(), 2);
        release_tx.send(()).unwrap();
        engine.wait_idle();
        assert_eq!(engine.mount(&spec("O:"), noop()).unwrap(), 1);
    }

    #[test]
    fn test_mount_without_sources_rejected() {
        let engine = MemoryEngine::new();
        let mut empty = spec("M:");
        empty.sources.clear();
        assert_eq!(
            engine.mount(&empty, noop()).unwrap_err().code,
            ErrorCode::InvalidParameter
        );
        assert!(engine.mount_ids().unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_mount_point_rejected() {
        let engine = MemoryEngine::new();
        engine.mount(&spec("M:"), noop()).unwrap();
        let err = engine.mount(&spec("m:"), noop()).unwrap_err();
        assert_eq!(err.code, ErrorCode::AlreadyExistingMountPoint);
    }

    #[test]
    fn test_injected_failure_applies_once() {
        let engine = MemoryEngine::new();
        engine.fail_next_mount(EngineError::os(5));
        assert!(engine.mount(&spec("M:"), noop()).is_err());
        assert!(engine.mount(&spec("M:"), noop()).is_ok());
    }

    #[test]
    fn test_complete_reports_code_once() {
        let engine = MemoryEngine::new();
        let seen = Arc::new(AtomicI32::new(0));
        let calls = Arc::new(AtomicI32::new(0));
        let handler: CompletionHandler = {
            let seen = seen.clone();
            let calls = calls.clone();
            Arc::new(move |_, info, code| {
                assert_eq!(info.map(|info| info.mount_point.as_str()), Some("M:"));
                seen.store(code, Ordering::SeqCst);
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        let mount_id = engine.mount(&spec("M:"), handler).unwrap();
        engine.complete(mount_id, -5).unwrap();
        assert!(engine.complete(mount_id, 0).is_err());
        engine.wait_idle();

        assert_eq!(seen.load(Ordering::SeqCst), -5);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_plugin_lookup_by_basename() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("MFPsample_x64.dll");
        std::fs::write(&path, b"").unwrap();

        let engine = MemoryEngine::new();
        let plugin_id = engine.add_plugin(&path, false).unwrap();
        assert_eq!(
            engine.add_plugin(&path, false).unwrap_err().code,
            ErrorCode::AlreadyExistingPlugin
        );

        let mut with_plugin = spec("M:");
        with_plugin.sources[0].plugin_filename = Some("mfpsample_x64.dll".to_string());
        let mount_id = engine.mount(&with_plugin, noop()).unwrap();
        assert_eq!(
            engine.mount_info(mount_id).unwrap().sources[0].plugin_id,
            plugin_id
        );

        let mut missing = spec("N:");
        missing.sources[0].plugin_filename = Some("MFPother_x64.dll".to_string());
        assert_eq!(
            engine.mount(&missing, noop()).unwrap_err().code,
            ErrorCode::InexistentPlugin
        );
    }
}
