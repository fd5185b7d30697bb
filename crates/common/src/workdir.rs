//! Scoped change of the process working directory
//!
//! Source locators in a mount configuration are relative to the file that
//! contains them, and the engine resolves them against the current working
//! directory. [`CurrentDirGuard`] switches into the configuration's directory
//! and switches back when dropped, on every exit path.

use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct CurrentDirGuard {
    previous: Option<PathBuf>,
}

impl CurrentDirGuard {
    /// Switch into `dir`, remembering the current directory
    pub fn enter(dir: &Path) -> io::Result<Self> {
        let previous = std::env::current_dir()?;
        std::env::set_current_dir(dir)?;
        tracing::debug!(dir = %dir.display(), "switched working directory");
        Ok(Self {
            previous: Some(previous),
        })
    }

    /// Switch into the directory containing `config_path`
    ///
    /// A bare file name has no parent to switch to; the guard then leaves the
    /// working directory alone.
    pub fn for_config(config_path: &Path) -> io::Result<Self> {
        match config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => Self::enter(parent),
            _ => Ok(Self { previous: None }),
        }
    }
}

impl Drop for CurrentDirGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            if let Err(e) = std::env::set_current_dir(&previous) {
                tracing::warn!(
                    dir = %previous.display(),
                    "failed to restore working directory: {}",
                    e
                );
            }
        }
    }
}
