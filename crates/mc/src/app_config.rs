//! Application configuration
//!
//! Read from `config.toml` in the platform config directory, or from the file
//! given with `--config`. Every field is optional.
//!
//! ```toml
//! plugins_dir = 'C:\MergeFS\Plugins'
//! safe_unmount_on_exit = true
//!
//! [log]
//! level = "debug"
//! dir = 'C:\Users\me\AppData\Local\MergeFS\MergeFSMC\logs'
//! file_prefix = "mergefsmc"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_LOG_FILE_PREFIX: &str = "mergefsmc";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Where source plugins are loaded from; next to the install when unset
    pub plugins_dir: Option<PathBuf>,
    pub safe_unmount_on_exit: bool,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            plugins_dir: None,
            safe_unmount_on_exit: true,
            log: LogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Filter directive; `RUST_LOG` takes precedence
    pub level: String,
    /// Directory for rolling log files; the platform data dir when unset
    pub dir: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            dir: None,
            file_prefix: DEFAULT_LOG_FILE_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "MergeFS", "MergeFSMC")
}

/// Default location of the config file, if the platform has one
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// Default directory for log files
pub fn default_log_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_local_dir().join("logs"))
}

/// Plugins directory of an install: `<exe dir>/../../Plugins`
pub fn default_plugins_dir(exe: &Path) -> PathBuf {
    let exe_dir = exe.parent().unwrap_or_else(|| Path::new("."));
    let install_root = exe_dir
        .parent()
        .and_then(Path::parent)
        .unwrap_or(exe_dir);
    install_root.join("Plugins")
}

impl AppConfig {
    /// Load from an explicit path, or from the default location
    ///
    /// A missing explicit file is an error; a missing default file yields
    /// the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, AppConfigError> {
        match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(AppConfigError::NotFound(path.to_path_buf()));
                }
                Self::from_file(path)
            }
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, AppConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| AppConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| AppConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Plugins directory to use for an executable at `exe`
    pub fn plugins_dir_for(&self, exe: &Path) -> PathBuf {
        self.plugins_dir
            .clone()
            .unwrap_or_else(|| default_plugins_dir(exe))
    }
}
