//! Event-loop core of the elected process
//!
//! [`Controller`] owns the [`MountManager`] and the two queues, and reacts to
//! three kinds of input:
//!
//! - [`UiEvent`]s it posted to itself (drain arguments, drain errors)
//! - [`MenuCommand`]s chosen in the tray menu
//! - copy-data messages relayed from later launches
//!
//! Everything user-facing goes through the [`Shell`] collaborator, which the
//! Windows front end implements with message boxes and Explorer.
//!
//! Engine completions run on engine threads. They only queue an error record,
//! post [`UiEvent::DrainErrors`] and play a sound; the dialog is shown later
//! from the event loop.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::command::MenuCommand;
use crate::engine::{EngineError, MountId, PluginId, PluginInfo};
use crate::events::{EventSink, UiEvent};
use crate::manager::MountManager;
use crate::queue::{ArgBatch, ArgQueue, ErrorQueue, MountErrorRecord};
use crate::registry::MountCallback;
use crate::relay::{self, CopyData, CopyDataReceiver};

pub const APP_TITLE: &str = "MergeFSMC";
pub const ERROR_TITLE: &str = "MergeFSMC Error";
pub const MOUNT_ERROR_TITLE: &str = "MergeFSMC Mount Error";
pub const PLUGIN_INFO_TITLE: &str = "MergeFSMC Source Plugin";
pub const EXIT_CONFIRM_TEXT: &str =
    "Are you sure you want to exit MergeFSMC?\nAll mounts will be unmounted.";
pub const UNKNOWN_ERROR_TEXT: &str = "an unknown error occurred";
pub const UNKNOWN_MOUNT_POINT: &str = "(unknown mount point)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemSound {
    DeviceConnect,
    DeviceDisconnect,
}

/// User-facing side effects, provided by the front end
pub trait Shell: Send + Sync {
    fn show_error(&self, title: &str, message: &str);

    fn show_info(&self, title: &str, message: &str);

    /// Ask an OK/Cancel question; true on OK
    fn confirm(&self, title: &str, message: &str) -> bool;

    /// Open a folder in the file browser
    fn explore(&self, path: &Path) -> bool;

    /// Show a file selected in its folder
    fn reveal(&self, path: &Path) -> bool;

    /// Let the user choose a mount configuration file
    fn pick_config_file(&self) -> Option<PathBuf>;

    fn play_sound(&self, sound: SystemSound);
}

/// What the event loop should do after an input was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    pub plugins_dir: PathBuf,
    /// Drain in-flight operations before detaching at exit
    pub safe_unmount_on_exit: bool,
}

enum CommandError {
    /// The engine rejected an action; its message is shown
    Engine(EngineError),
    /// A lookup failed; details stay in the log
    Lookup(String),
}

impl From<EngineError> for CommandError {
    fn from(err: EngineError) -> Self {
        CommandError::Engine(err)
    }
}

pub struct Controller {
    manager: MountManager,
    args: ArgQueue,
    errors: Arc<ErrorQueue>,
    sink: Arc<dyn EventSink>,
    shell: Arc<dyn Shell>,
    options: ControllerOptions,
    busy: AtomicBool,
}

impl Controller {
    pub fn new(
        manager: MountManager,
        shell: Arc<dyn Shell>,
        sink: Arc<dyn EventSink>,
        options: ControllerOptions,
    ) -> Self {
        Self {
            manager,
            args: ArgQueue::new(),
            errors: Arc::new(ErrorQueue::new()),
            sink,
            shell,
            options,
            busy: AtomicBool::new(false),
        }
    }

    pub fn manager(&self) -> &MountManager {
        &self.manager
    }

    /// Whether a modal dialog owned by the controller is open
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Queue an argument batch and schedule a drain
    pub fn submit(&self, batch: ArgBatch) {
        self.args.push(batch);
        if !self.sink.post(UiEvent::DrainArgs) {
            tracing::warn!("could not schedule argument drain; mounts are delayed");
        }
    }

    pub fn handle(&self, event: UiEvent) {
        match event {
            UiEvent::DrainArgs => self.drain_args(),
            UiEvent::DrainErrors => self.drain_errors(),
        }
    }

    fn drain_args(&self) {
        let paths = self.args.drain_paths();
        tracing::debug!(count = paths.len(), "draining argument queue");
        for path in paths {
            self.mount_config(Path::new(&path));
        }
        self.sink.post(UiEvent::DrainErrors);
    }

    fn drain_errors(&self) {
        let records = self.errors.drain();
        if records.is_empty() {
            return;
        }
        tracing::info!(count = records.len(), "reporting mount errors");
        for record in records {
            self.shell.show_error(MOUNT_ERROR_TITLE, &record.to_string());
        }
    }

    /// Mount one configuration, queueing the failure if it does not mount
    pub fn mount_config(&self, config_path: &Path) -> Option<MountId> {
        match self.manager.add_mount(config_path, self.completion_callback()) {
            Ok(mount_id) => {
                self.shell.play_sound(SystemSound::DeviceConnect);
                Some(mount_id)
            }
            Err(e) => {
                self.errors.push(MountErrorRecord {
                    config_path: e.config_path.clone(),
                    mount_point: e.mount_point.clone().unwrap_or_default(),
                    reason: e.reason(),
                    from_completion: false,
                });
                None
            }
        }
    }

    fn completion_callback(&self) -> MountCallback {
        let errors = self.errors.clone();
        let sink = self.sink.clone();
        let shell = self.shell.clone();
        Arc::new(move |_mount_id, code, record, info| {
            if code != 0 {
                errors.push(MountErrorRecord {
                    config_path: record.config_path().to_path_buf(),
                    mount_point: info
                        .map(|info| info.mount_point.clone())
                        .unwrap_or_else(|| UNKNOWN_MOUNT_POINT.to_string()),
                    reason: format!("DokanMain returned code {}", code),
                    from_completion: true,
                });
                sink.post(UiEvent::DrainErrors);
            }
            shell.play_sound(SystemSound::DeviceDisconnect);
        })
    }

    /// Execute a menu command
    pub fn dispatch(&self, command: MenuCommand) -> Flow {
        tracing::debug!(?command, "menu command");
        let result: Result<(), CommandError> = match command {
            MenuCommand::Exit => return self.close_requested(),
            MenuCommand::AddMount => {
                if let Some(path) = self.shell.pick_config_file() {
                    self.submit(vec![String::new(), path.to_string_lossy().into_owned()]);
                }
                Ok(())
            }
            MenuCommand::UnmountAll => self.manager.unmount_all(true).map_err(Into::into),
            MenuCommand::OpenPluginsDir => {
                self.explore(&self.options.plugins_dir);
                Ok(())
            }
            MenuCommand::PluginInfo(plugin_id) => self.show_plugin_info(plugin_id),
            MenuCommand::MountTop(_) => Ok(()),
            MenuCommand::OpenMountPoint(mount_id) => self.open_mount_point(mount_id),
            MenuCommand::OpenConfig(mount_id) => self.open_config(mount_id),
            MenuCommand::Unmount(mount_id) => {
                self.manager.remove_mount(mount_id, true).map_err(Into::into)
            }
        };

        match result {
            Ok(()) => {}
            Err(CommandError::Engine(e)) => {
                tracing::warn!(?command, "command failed: {}", e);
                self.shell.show_error(ERROR_TITLE, &e.message());
            }
            Err(CommandError::Lookup(reason)) => {
                tracing::warn!(?command, "command failed: {}", reason);
                self.shell.show_error(ERROR_TITLE, UNKNOWN_ERROR_TEXT);
            }
        }
        Flow::Continue
    }

    fn show_plugin_info(&self, plugin_id: PluginId) -> Result<(), CommandError> {
        let info = self
            .manager
            .plugin_info(plugin_id)
            .map_err(|e| CommandError::Lookup(e.to_string()))?;
        self.modal(|| self.shell.show_info(PLUGIN_INFO_TITLE, &plugin_info_text(&info)));
        Ok(())
    }

    fn open_mount_point(&self, mount_id: MountId) -> Result<(), CommandError> {
        let info = self
            .manager
            .mount_info(mount_id)
            .map_err(|e| CommandError::Lookup(e.to_string()))?;
        self.explore(Path::new(&info.mount_point));
        Ok(())
    }

    fn open_config(&self, mount_id: MountId) -> Result<(), CommandError> {
        let path = self
            .manager
            .mount_config_path(mount_id)
            .ok_or_else(|| CommandError::Lookup(format!("mount {} is not registered", mount_id)))?;
        if !self.shell.reveal(&path) {
            tracing::warn!(path = %path.display(), "failed to reveal configuration file");
        }
        Ok(())
    }

    fn explore(&self, path: &Path) {
        if !self.shell.explore(path) {
            tracing::warn!(path = %path.display(), "failed to open folder");
        }
    }

    fn modal<R>(&self, f: impl FnOnce() -> R) -> R {
        self.busy.store(true, Ordering::SeqCst);
        let result = f();
        self.busy.store(false, Ordering::SeqCst);
        result
    }

    /// The user asked to close the application
    ///
    /// Ignored while a modal dialog is open. With live mounts the user must
    /// confirm, since exiting unmounts them.
    pub fn close_requested(&self) -> Flow {
        if self.is_busy() {
            return Flow::Continue;
        }
        let live = self.manager.count_mounts().unwrap_or_else(|e| {
            tracing::warn!("failed to count mounts: {}", e);
            0
        });
        if live == 0 {
            return Flow::Quit;
        }
        if self.modal(|| self.shell.confirm(APP_TITLE, EXIT_CONFIRM_TEXT)) {
            Flow::Quit
        } else {
            Flow::Continue
        }
    }

    /// Unmount everything before the process exits
    pub fn shutdown(&self) {
        if let Err(e) = self.manager.uninit(self.options.safe_unmount_on_exit) {
            tracing::error!("failed to unmount on exit: {}", e);
        }
    }
}

impl CopyDataReceiver for Controller {
    fn receive(&self, message: &CopyData) -> bool {
        match relay::decode_args(message) {
            Ok(batch) => {
                tracing::info!(count = batch.len(), "received relayed arguments");
                self.submit(batch);
                true
            }
            Err(e) => {
                tracing::warn!("rejected relayed message: {}", e);
                false
            }
        }
    }
}

/// Text of the plugin information dialog
pub fn plugin_info_text(info: &PluginInfo) -> String {
    format!(
        "{}\n{} ver. {} ({})\n{}",
        info.basename(),
        info.name,
        info.version_string,
        info.version,
        info.description
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_info_text() {
        let info = PluginInfo {
            filename: PathBuf::from("plugins").join("MFPZip_x64.dll"),
            name: "Zip".to_string(),
            description: "Zip archives".to_string(),
            version: 65536,
            version_string: "1.0.0".to_string(),
            guid: String::new(),
            interface_version: 1,
        };
        assert_eq!(
            plugin_info_text(&info),
            "MFPZip_x64.dll\nZip ver. 1.0.0 (65536)\nZip archives"
        );
    }
}
