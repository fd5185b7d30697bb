//! Mount lifecycle
//!
//! [`MountManager`] is the only thing that talks to the engine. It translates
//! configuration files, mounts them, keeps the [`MountRegistry`] in step and
//! routes engine completions back to the callback registered for each mount.
//!
//! # Completion trampoline
//!
//! The engine reports mount termination from its own threads, and a failure
//! raised there cannot cross back into the engine. The handler given to the
//! engine therefore never fails: a missing record is ignored and a panicking
//! callback is caught and logged at the boundary.
//!
//! A mount call and the insertion of its record happen under the admission
//! lock, and the trampoline takes that lock before its lookup, so a completion
//! always observes the record of a mount whose call has returned.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::config::{self, ConfigError};
use crate::engine::{
    CompletionHandler, Engine, EngineError, ErrorCode, MountId, MountInfo, PluginId, PluginInfo,
};
use crate::registry::{MountCallback, MountRecord, MountRegistry};
use crate::workdir::CurrentDirGuard;

/// Plugin file name suffix for the running architecture
#[cfg(target_pointer_width = "64")]
pub const PLUGIN_SUFFIX: &str = "_x64.dll";
#[cfg(not(target_pointer_width = "64"))]
pub const PLUGIN_SUFFIX: &str = "_x86.dll";

/// Plugin file name prefix
pub const PLUGIN_PREFIX: &str = "MFP";

/// Why a mount attempt failed before the engine took ownership of it
#[derive(Debug, thiserror::Error)]
pub enum MountFailure {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("failed to enter configuration directory: {0}")]
    WorkingDir(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
#[error("failed to mount {}: {source}", config_path.display())]
pub struct MountError {
    pub config_path: PathBuf,
    /// Known once the configuration has been translated
    pub mount_point: Option<String>,
    #[source]
    pub source: MountFailure,
}

impl MountError {
    /// Human readable reason, without the configuration context
    pub fn reason(&self) -> String {
        self.source.to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PluginLoadError {
    #[error("failed to read plugin directory {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to load plugin {}: {source}", path.display())]
    Engine {
        path: PathBuf,
        #[source]
        source: EngineError,
    },
}

/// A mount the engine reports as live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveMount {
    pub id: MountId,
    pub info: MountInfo,
    /// `None` when the mount was not created through this manager
    pub config_path: Option<PathBuf>,
}

pub struct MountManager {
    engine: Arc<dyn Engine>,
    registry: Arc<MountRegistry>,
    admission: Arc<Mutex<()>>,
}

impl MountManager {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            registry: Arc::new(MountRegistry::new()),
            admission: Arc::new(Mutex::new(())),
        }
    }

    pub fn registry(&self) -> &MountRegistry {
        &self.registry
    }

    /// Translate and mount the configuration at `config_path`
    ///
    /// The working directory is switched to the configuration's directory for
    /// the duration of the engine call and restored before returning.
    /// `on_complete` runs exactly once, on an engine thread, when the mount
    /// terminates.
    pub fn add_mount(
        &self,
        config_path: &Path,
        on_complete: MountCallback,
    ) -> Result<MountId, MountError> {
        let fail = |mount_point: Option<String>, source: MountFailure| MountError {
            config_path: config_path.to_path_buf(),
            mount_point,
            source,
        };

        let spec = config::translate(config_path).map_err(|e| fail(None, e.into()))?;
        let mount_point = Some(spec.mount_point.clone());

        let _dir = CurrentDirGuard::for_config(config_path)
            .map_err(|e| fail(mount_point.clone(), e.into()))?;

        let handler = completion_trampoline(
            Arc::downgrade(&self.registry),
            Arc::downgrade(&self.admission),
        );

        let mount_id = {
            let _admission = self.admission.lock();
            let mount_id = self
                .engine
                .mount(&spec, handler)
                .map_err(|e| fail(mount_point.clone(), e.into()))?;
            self.registry.insert(
                mount_id,
                MountRecord::new(config_path.to_path_buf(), on_complete),
            );
            mount_id
        };

        tracing::info!(
            mount_id,
            config = %config_path.display(),
            mount_point = %spec.mount_point,
            sources = spec.sources.len(),
            "mounted"
        );
        Ok(mount_id)
    }

    pub fn remove_mount(&self, mount_id: MountId, safe: bool) -> Result<(), EngineError> {
        tracing::info!(mount_id, safe, "unmounting");
        self.engine.unmount(mount_id, safe)
    }

    pub fn unmount_all(&self, safe: bool) -> Result<(), EngineError> {
        tracing::info!(safe, "unmounting all mounts");
        self.engine.unmount_all(safe)
    }

    /// Unmount everything and forget every record
    ///
    /// Completions still in flight afterwards find no record and are dropped.
    pub fn uninit(&self, safe: bool) -> Result<(), EngineError> {
        let result = self.engine.unmount_all(safe);
        let dropped = self.registry.clear();
        tracing::info!(dropped, "mount manager shut down");
        result
    }

    pub fn mount_info(&self, mount_id: MountId) -> Result<MountInfo, EngineError> {
        self.engine.mount_info(mount_id)
    }

    /// Number of mounts the engine reports as live
    pub fn count_mounts(&self) -> Result<usize, EngineError> {
        Ok(self.engine.mount_ids()?.len())
    }

    /// Configuration path for a registered mount
    pub fn mount_config_path(&self, mount_id: MountId) -> Option<PathBuf> {
        self.registry
            .get(mount_id)
            .ok()
            .map(|record| record.config_path().to_path_buf())
    }

    /// Every mount the engine reports, joined with registry data
    ///
    /// A mount that disappears between enumeration and lookup is skipped.
    pub fn list_mounts(&self) -> Result<Vec<LiveMount>, EngineError> {
        let mut mounts = Vec::new();
        for id in self.engine.mount_ids()? {
            let info = match self.engine.mount_info(id) {
                Ok(info) => info,
                Err(e) if is_vanished(&e) => continue,
                Err(e) => return Err(e),
            };
            mounts.push(LiveMount {
                id,
                info,
                config_path: self.mount_config_path(id),
            });
        }
        Ok(mounts)
    }

    pub fn add_plugin(&self, path: &Path) -> Result<PluginId, EngineError> {
        let plugin_id = self.engine.add_plugin(path, false)?;
        tracing::info!(plugin_id, path = %path.display(), "loaded source plugin");
        Ok(plugin_id)
    }

    /// Load every `MFP*` plugin for this architecture found in `dir`
    ///
    /// Files load in name order. Loading stops at the first failure.
    pub fn add_plugins_from_dir(&self, dir: &Path) -> Result<Vec<PluginId>, PluginLoadError> {
        let entries = std::fs::read_dir(dir).map_err(|source| PluginLoadError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| PluginLoadError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let name = entry.file_name();
            if is_plugin_file_name(&name.to_string_lossy()) && entry.path().is_file() {
                paths.push(entry.path());
            }
        }
        paths.sort();

        let mut ids = Vec::with_capacity(paths.len());
        for path in paths {
            let id = self
                .add_plugin(&path)
                .map_err(|source| PluginLoadError::Engine {
                    path: path.clone(),
                    source,
                })?;
            ids.push(id);
        }
        tracing::info!(dir = %dir.display(), count = ids.len(), "loaded plugin directory");
        Ok(ids)
    }

    pub fn remove_plugin(&self, plugin_id: PluginId) -> Result<(), EngineError> {
        self.engine.remove_plugin(plugin_id)?;
        tracing::info!(plugin_id, "removed source plugin");
        Ok(())
    }

    pub fn plugin_info(&self, plugin_id: PluginId) -> Result<PluginInfo, EngineError> {
        self.engine.plugin_info(plugin_id)
    }

    pub fn list_plugins(&self) -> Result<Vec<(PluginId, PluginInfo)>, EngineError> {
        let mut plugins = Vec::new();
        for id in self.engine.plugin_ids()? {
            match self.engine.plugin_info(id) {
                Ok(info) => plugins.push((id, info)),
                Err(e) if is_vanished(&e) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(plugins)
    }
}

fn is_vanished(err: &EngineError) -> bool {
    matches!(
        err.code,
        ErrorCode::InvalidMountId
            | ErrorCode::InexistentMount
            | ErrorCode::InvalidPluginId
            | ErrorCode::InexistentPlugin
    )
}

/// Whether `name` looks like a source plugin for this architecture
pub fn is_plugin_file_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.len() >= PLUGIN_PREFIX.len() + PLUGIN_SUFFIX.len()
        && lower.starts_with(&PLUGIN_PREFIX.to_ascii_lowercase())
        && lower.ends_with(&PLUGIN_SUFFIX.to_ascii_lowercase())
}

fn completion_trampoline(
    registry: Weak<MountRegistry>,
    admission: Weak<Mutex<()>>,
) -> CompletionHandler {
    Arc::new(move |mount_id, info, code| {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            dispatch_completion(&registry, &admission, mount_id, info, code)
        }));
        if outcome.is_err() {
            tracing::error!(mount_id, code, "mount completion dispatch panicked");
        }
    })
}

fn dispatch_completion(
    registry: &Weak<MountRegistry>,
    admission: &Weak<Mutex<()>>,
    mount_id: MountId,
    info: Option<&MountInfo>,
    code: i32,
) {
    let Some(registry) = registry.upgrade() else {
        return;
    };
    if let Some(admission) = admission.upgrade() {
        drop(admission.lock());
    }

    let record = match registry.get(mount_id) {
        Ok(record) => record,
        Err(e) => {
            tracing::debug!(mount_id, code, "dropping completion: {}", e);
            return;
        }
    };

    tracing::info!(
        mount_id,
        code,
        config = %record.config_path().display(),
        "mount terminated"
    );
    let notified = panic::catch_unwind(AssertUnwindSafe(|| record.notify(mount_id, code, info)));
    registry.remove(mount_id);
    if notified.is_err() {
        tracing::error!(mount_id, code, "mount completion callback panicked");
    }
}
