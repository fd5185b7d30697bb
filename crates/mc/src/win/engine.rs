//! Binding to the native LibMergeFS engine
//!
//! The library reports failures through a thread-agnostic "last error" pair
//! read back with `GetError`. Every call here converts a `FALSE` return into
//! an [`EngineError`] right away.
//!
//! # Completions
//!
//! The native completion callback carries no user context, so handlers are
//! kept in a process-wide table keyed by mount id. The table lock is held
//! across the native `Mount` call: a completion that races the call blocks
//! in the trampoline until its handler has been stored.

use std::collections::BTreeMap;
use std::ffi::CString;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use windows::core::{GUID, HSTRING, PCSTR, PCWSTR};
use windows::Win32::Foundation::BOOL;

use common::config::MountSpec;
use common::engine::{
    CompletionHandler, Engine, EngineError, ErrorCode, MountId, MountInfo, MountSourceInfo,
    PluginId, PluginInfo,
};

use super::wide;

/// Retries when the set changes between the count and fetch calls
const ENUMERATION_ATTEMPTS: usize = 4;

#[repr(C, packed(1))]
struct RawPluginInfo {
    interface_version: u32,
    plugin_type: u32,
    guid: GUID,
    name: PCWSTR,
    description: PCWSTR,
    version: u32,
    version_string: PCWSTR,
}

#[repr(C, packed(1))]
struct RawPluginInfoEx {
    filename: PCWSTR,
    plugin_info: RawPluginInfo,
}

#[repr(C, packed(1))]
struct RawMountSourceInfo {
    mount_source: PCWSTR,
    source_plugin_id: PluginId,
    source_plugin_options_json: PCSTR,
}

#[repr(C, packed(1))]
struct RawMountInfo {
    mount_point: PCWSTR,
    writable: BOOL,
    metadata_file_name: PCWSTR,
    defer_copy_enabled: BOOL,
    case_sensitive: BOOL,
    num_sources: u32,
    sources: *const RawMountSourceInfo,
}

#[repr(C, packed(1))]
struct RawMountSourceInitializeInfo {
    mount_source: PCWSTR,
    source_plugin_guid: GUID,
    source_plugin_filename: PCWSTR,
    source_plugin_options_json: PCSTR,
}

#[repr(C, packed(1))]
struct RawMountInitializeInfo {
    mount_point: PCWSTR,
    writable: BOOL,
    metadata_file_name: PCWSTR,
    defer_copy_enabled: BOOL,
    case_sensitive: BOOL,
    num_sources: u32,
    sources: *const RawMountSourceInitializeInfo,
}

type RawMountCallback = extern "system" fn(MountId, *const RawMountInfo, i32);

#[link(name = "LibMergeFS")]
extern "system" {
    fn GetError(win32error: *mut BOOL) -> u32;
    fn Init() -> BOOL;
    fn Uninit() -> BOOL;
    fn AddSourcePlugin(filename: PCWSTR, front: BOOL, out_plugin_id: *mut PluginId) -> BOOL;
    fn RemoveSourcePlugin(plugin_id: PluginId) -> BOOL;
    fn GetSourcePlugins(out_num: *mut u32, out_plugin_ids: *mut PluginId, max: u32) -> BOOL;
    fn GetSourcePluginInfo(plugin_id: PluginId, out_info: *mut RawPluginInfoEx) -> BOOL;
    fn Mount(
        info: *const RawMountInitializeInfo,
        callback: RawMountCallback,
        out_mount_id: *mut MountId,
    ) -> BOOL;
    fn GetMounts(out_num: *mut u32, out_mount_ids: *mut MountId, max: u32) -> BOOL;
    fn GetMountInfo(mount_id: MountId, out_info: *mut RawMountInfo) -> BOOL;
    fn SafeUnmount(mount_id: MountId) -> BOOL;
    fn Unmount(mount_id: MountId) -> BOOL;
    fn SafeUnmountAll() -> BOOL;
    fn UnmountAll() -> BOOL;
}

static HANDLERS: Mutex<BTreeMap<MountId, CompletionHandler>> =
    parking_lot::const_mutex(BTreeMap::new());

/// Read the engine's last error
fn last_error() -> EngineError {
    let mut win32 = BOOL(0);
    let code = unsafe { GetError(&mut win32) };
    if win32.as_bool() {
        EngineError::os(code)
    } else {
        EngineError::new(ErrorCode::from_raw(code))
    }
}

fn check(ok: BOOL) -> Result<(), EngineError> {
    if ok.as_bool() {
        Ok(())
    } else {
        Err(last_error())
    }
}

/// Count-then-fetch enumeration shared by plugins and mounts
fn enumerate(
    fetch: unsafe extern "system" fn(*mut u32, *mut u32, u32) -> BOOL,
) -> Result<Vec<u32>, EngineError> {
    let mut last = EngineError::new(ErrorCode::MoreData);
    for _ in 0..ENUMERATION_ATTEMPTS {
        let mut count = 0u32;
        check(unsafe { fetch(&mut count, std::ptr::null_mut(), 0) })?;
        let mut ids = vec![0u32; count as usize];
        let mut fetched = 0u32;
        match check(unsafe { fetch(&mut fetched, ids.as_mut_ptr(), count) }) {
            Ok(()) => {
                ids.truncate(fetched.min(count) as usize);
                return Ok(ids);
            }
            Err(e) if e.code == ErrorCode::MoreData => {
                tracing::debug!(count, fetched, "enumeration grew, retrying");
                last = e;
            }
            Err(e) => return Err(e),
        }
    }
    Err(last)
}

unsafe fn mount_info_from_raw(raw: &RawMountInfo) -> MountInfo {
    let count = raw.num_sources as usize;
    let sources_ptr = raw.sources;
    let sources = if sources_ptr.is_null() || count == 0 {
        Vec::new()
    } else {
        std::slice::from_raw_parts(sources_ptr, count)
            .iter()
            .map(|source| MountSourceInfo {
                source: wide::read_pcwstr({ source.mount_source }),
                plugin_id: { source.source_plugin_id },
                options: wide::read_pcstr({ source.source_plugin_options_json }),
            })
            .collect()
    };
    MountInfo {
        mount_point: wide::read_pcwstr({ raw.mount_point }),
        writable: { raw.writable }.as_bool(),
        metadata: wide::read_pcwstr({ raw.metadata_file_name }),
        defer_copy_enabled: { raw.defer_copy_enabled }.as_bool(),
        case_sensitive: { raw.case_sensitive }.as_bool(),
        sources,
    }
}

extern "system" fn on_mount_complete(mount_id: MountId, info: *const RawMountInfo, code: i32) {
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let handler = HANDLERS.lock().remove(&mount_id);
        let info = unsafe { info.as_ref() }.map(|raw| unsafe { mount_info_from_raw(raw) });
        match handler {
            Some(handler) => handler(mount_id, info.as_ref(), code),
            None => tracing::debug!(mount_id, code, "completion for unknown mount"),
        }
    }));
    if outcome.is_err() {
        tracing::error!(mount_id, "completion handler panicked");
    }
}

/// Owned wide/narrow strings backing one native mount request
struct SourceBuffers {
    source: HSTRING,
    plugin_filename: HSTRING,
    options: CString,
}

/// The initialised native engine; `Uninit` runs on drop
pub struct LibMergeFs {
    _private: (),
}

impl LibMergeFs {
    pub fn init() -> Result<Self, EngineError> {
        check(unsafe { Init() })?;
        tracing::info!("LibMergeFS initialised");
        Ok(Self { _private: () })
    }
}

impl Drop for LibMergeFs {
    fn drop(&mut self) {
        if let Err(e) = check(unsafe { Uninit() }) {
            tracing::error!("LibMergeFS uninit failed: {}", e);
        }
        HANDLERS.lock().clear();
    }
}

impl Engine for LibMergeFs {
    fn add_plugin(&self, path: &Path, front: bool) -> Result<PluginId, EngineError> {
        let filename = HSTRING::from(path.as_os_str());
        let mut plugin_id = 0;
        check(unsafe { AddSourcePlugin(PCWSTR(filename.as_ptr()), BOOL::from(front), &mut plugin_id) })?;
        Ok(plugin_id)
    }

    fn remove_plugin(&self, plugin_id: PluginId) -> Result<(), EngineError> {
        check(unsafe { RemoveSourcePlugin(plugin_id) })
    }

    fn plugin_ids(&self) -> Result<Vec<PluginId>, EngineError> {
        enumerate(GetSourcePlugins)
    }

    fn plugin_info(&self, plugin_id: PluginId) -> Result<PluginInfo, EngineError> {
        let mut raw = std::mem::MaybeUninit::<RawPluginInfoEx>::zeroed();
        check(unsafe { GetSourcePluginInfo(plugin_id, raw.as_mut_ptr()) })?;
        let raw = unsafe { raw.assume_init() };
        let info = raw.plugin_info;
        Ok(unsafe {
            PluginInfo {
                filename: PathBuf::from(wide::read_pcwstr({ raw.filename })),
                name: wide::read_pcwstr({ info.name }),
                description: wide::read_pcwstr({ info.description }),
                version: { info.version },
                version_string: wide::read_pcwstr({ info.version_string }),
                guid: format!("{:?}", { info.guid }),
                interface_version: { info.interface_version },
            }
        })
    }

    fn mount(&self, spec: &MountSpec, on_complete: CompletionHandler) -> Result<MountId, EngineError> {
        let buffers = spec
            .sources
            .iter()
            .map(|source| {
                Ok(SourceBuffers {
                    source: HSTRING::from(source.source.as_str()),
                    plugin_filename: HSTRING::from(source.plugin_filename.as_deref().unwrap_or("")),
                    options: CString::new(source.plugin_options.as_deref().unwrap_or(""))
                        .map_err(|_| EngineError::new(ErrorCode::InvalidParameter))?,
                })
            })
            .collect::<Result<Vec<_>, EngineError>>()?;
        let sources: Vec<RawMountSourceInitializeInfo> = buffers
            .iter()
            .map(|buffer| RawMountSourceInitializeInfo {
                mount_source: PCWSTR(buffer.source.as_ptr()),
                source_plugin_guid: GUID::zeroed(),
                source_plugin_filename: PCWSTR(buffer.plugin_filename.as_ptr()),
                source_plugin_options_json: PCSTR(buffer.options.as_ptr().cast()),
            })
            .collect();

        let mount_point = HSTRING::from(spec.mount_point.as_str());
        let metadata = HSTRING::from(spec.metadata.as_str());
        let info = RawMountInitializeInfo {
            mount_point: PCWSTR(mount_point.as_ptr()),
            writable: BOOL::from(spec.writable),
            metadata_file_name: PCWSTR(metadata.as_ptr()),
            defer_copy_enabled: BOOL::from(spec.defer_copy_enabled),
            case_sensitive: BOOL::from(spec.case_sensitive),
            num_sources: sources.len() as u32,
            sources: sources.as_ptr(),
        };

        let mut handlers = HANDLERS.lock();
        let mut mount_id = 0;
        check(unsafe { Mount(&info, on_mount_complete, &mut mount_id) })?;
        handlers.insert(mount_id, on_complete);
        Ok(mount_id)
    }

    fn mount_ids(&self) -> Result<Vec<MountId>, EngineError> {
        enumerate(GetMounts)
    }

    fn mount_info(&self, mount_id: MountId) -> Result<MountInfo, EngineError> {
        let mut raw = std::mem::MaybeUninit::<RawMountInfo>::zeroed();
        check(unsafe { GetMountInfo(mount_id, raw.as_mut_ptr()) })?;
        Ok(unsafe { mount_info_from_raw(&raw.assume_init()) })
    }

    fn unmount(&self, mount_id: MountId, safe: bool) -> Result<(), EngineError> {
        if safe {
            check(unsafe { SafeUnmount(mount_id) })
        } else {
            check(unsafe { Unmount(mount_id) })
        }
    }

    fn unmount_all(&self, safe: bool) -> Result<(), EngineError> {
        if safe {
            check(unsafe { SafeUnmountAll() })
        } else {
            check(unsafe { UnmountAll() })
        }
    }
}
