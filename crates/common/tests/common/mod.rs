//! Shared helpers for integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;

use ::common::controller::{Controller, ControllerOptions, Shell, SystemSound};
use ::common::engine::memory::MemoryEngine;
use ::common::events::{EventDispatcher, EventReceiver};
use ::common::manager::MountManager;

/// Minimal valid configuration mounting one source
pub fn config_text(mount_point: &str) -> String {
    format!(
        "mountPoint: '{}'\nmetadata: meta.db\nsources:\n  - source: base\n  - source: overlay\n",
        mount_point
    )
}

pub fn write_config(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

/// Route logs to the test writer; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Shell that records every interaction
#[derive(Default)]
pub struct RecordingShell {
    pub errors: Mutex<Vec<(String, String)>>,
    pub infos: Mutex<Vec<(String, String)>>,
    pub confirms: Mutex<Vec<String>>,
    pub explored: Mutex<Vec<PathBuf>>,
    pub revealed: Mutex<Vec<PathBuf>>,
    pub sounds: Mutex<Vec<SystemSound>>,
    pub confirm_answer: Mutex<bool>,
    pub picked: Mutex<Option<PathBuf>>,
}

impl RecordingShell {
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.lock().iter().map(|(_, m)| m.clone()).collect()
    }

    pub fn sounds(&self) -> Vec<SystemSound> {
        self.sounds.lock().clone()
    }
}

impl Shell for RecordingShell {
    fn show_error(&self, title: &str, message: &str) {
        self.errors
            .lock()
            .push((title.to_string(), message.to_string()));
    }

    fn show_info(&self, title: &str, message: &str) {
        self.infos
            .lock()
            .push((title.to_string(), message.to_string()));
    }

    fn confirm(&self, _title: &str, message: &str) -> bool {
        self.confirms.lock().push(message.to_string());
        *self.confirm_answer.lock()
    }

    fn explore(&self, path: &Path) -> bool {
        self.explored.lock().push(path.to_path_buf());
        true
    }

    fn reveal(&self, path: &Path) -> bool {
        self.revealed.lock().push(path.to_path_buf());
        true
    }

    fn pick_config_file(&self) -> Option<PathBuf> {
        self.picked.lock().take()
    }

    fn play_sound(&self, sound: SystemSound) {
        self.sounds.lock().push(sound);
    }
}

pub struct TestEnv {
    pub controller: Arc<Controller>,
    pub engine: Arc<MemoryEngine>,
    pub shell: Arc<RecordingShell>,
    pub events: EventReceiver,
    pub dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        init_tracing();
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(MemoryEngine::new());
        let shell = Arc::new(RecordingShell::default());
        let (dispatcher, events) = EventDispatcher::new();
        let controller = Arc::new(Controller::new(
            MountManager::new(engine.clone()),
            shell.clone(),
            Arc::new(dispatcher),
            ControllerOptions {
                plugins_dir: dir.path().join("Plugins"),
                safe_unmount_on_exit: true,
            },
        ));
        Self {
            controller,
            engine,
            shell,
            events,
            dir,
        }
    }

    pub fn write_config(&self, name: &str, text: &str) -> PathBuf {
        write_config(self.dir.path(), name, text)
    }

    /// Handle posted events until the queue and engine are both quiet
    pub fn pump(&self) {
        loop {
            self.engine.wait_idle();
            match self.events.try_recv() {
                Some(event) => self.controller.handle(event),
                None => return,
            }
        }
    }
}
