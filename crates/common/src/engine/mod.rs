//! Boundary to the external filesystem-merging engine
//!
//! The engine owns the runtime state of every mount and every loaded source
//! plugin. This module describes what the controller needs from it as the
//! [`Engine`] trait, plus the plain data it hands back.
//!
//! # Implementations
//!
//! - The native LibMergeFS binding lives in the tray crate (Windows only)
//! - [`memory::MemoryEngine`]: an in-process engine used by tests and dry runs
//!
//! # Enumeration
//!
//! The native engine enumerates with a count-then-fetch pair of calls. The
//! set can change between the two calls; a shrink is reported as a shorter
//! list and a grow surfaces as [`ErrorCode::MoreData`], which callers may
//! retry. Implementations hand back freshly built vectors either way.

mod error;
pub mod memory;

use std::path::PathBuf;
use std::sync::Arc;

pub use error::{EngineError, ErrorCode};

use crate::config::MountSpec;

/// Engine-assigned mount identifier, unique among live mounts
pub type MountId = u32;

/// Engine-assigned plugin identifier, stable for the process lifetime
pub type PluginId = u32;

/// Reserved "no mount" identifier
pub const MOUNT_ID_NULL: MountId = 0;

/// Reserved "no plugin" identifier
pub const PLUGIN_ID_NULL: PluginId = 0;

/// Invoked by the engine exactly once when a mount terminates
///
/// Arguments are the mount id, the mount's info when the engine still has it,
/// and the engine's result code (`0` for a normal unmount).
pub type CompletionHandler = Arc<dyn Fn(MountId, Option<&MountInfo>, i32) + Send + Sync>;

/// Descriptive information about a loaded source plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    /// Full path the plugin was loaded from
    pub filename: PathBuf,
    pub name: String,
    pub description: String,
    pub version: u32,
    pub version_string: String,
    pub guid: String,
    pub interface_version: u32,
}

impl PluginInfo {
    /// File name component of the plugin path
    pub fn basename(&self) -> String {
        self.filename
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.filename.to_string_lossy().into_owned())
    }
}

/// One source of a live mount, as the engine reports it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSourceInfo {
    pub source: String,
    pub plugin_id: PluginId,
    pub options: String,
}

/// Runtime information about a live mount
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    pub mount_point: String,
    pub writable: bool,
    pub metadata: String,
    pub defer_copy_enabled: bool,
    pub case_sensitive: bool,
    pub sources: Vec<MountSourceInfo>,
}

/// Operations consumed from the merging engine
///
/// Every call is synchronous. `mount` must not invoke `on_complete` before it
/// has returned to the caller; completion may arrive later on any thread.
pub trait Engine: Send + Sync {
    /// Load a source plugin, at the front of the lookup order when `front`
    fn add_plugin(&self, path: &std::path::Path, front: bool) -> Result<PluginId, EngineError>;

    fn remove_plugin(&self, plugin_id: PluginId) -> Result<(), EngineError>;

    fn plugin_ids(&self) -> Result<Vec<PluginId>, EngineError>;

    fn plugin_info(&self, plugin_id: PluginId) -> Result<PluginInfo, EngineError>;

    /// Mount a resolved mount request
    ///
    /// Relative source locators are resolved by the engine against the
    /// current working directory of the process.
    fn mount(&self, spec: &MountSpec, on_complete: CompletionHandler)
        -> Result<MountId, EngineError>;

    fn mount_ids(&self) -> Result<Vec<MountId>, EngineError>;

    fn mount_info(&self, mount_id: MountId) -> Result<MountInfo, EngineError>;

    /// Detach a mount; `safe` drains in-flight operations first
    fn unmount(&self, mount_id: MountId, safe: bool) -> Result<(), EngineError>;

    fn unmount_all(&self, safe: bool) -> Result<(), EngineError>;
}
