//! Logging setup
//!
//! The tray process has no console, so logs go to a daily rolling file
//! through a non-blocking writer. `--foreground` adds a console layer.
//! `RUST_LOG` overrides the configured level.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::app_config::{default_log_dir, LogConfig};

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("no log directory available")]
    NoLogDir,
    #[error("failed to create log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to create log file appender: {0}")]
    Appender(#[from] rolling::InitError),
    #[error("failed to install subscriber: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}

/// Resolved logging options
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub level: String,
    pub dir: Option<PathBuf>,
    pub file_prefix: String,
    pub console: bool,
}

impl LogSettings {
    /// Combine the config file with command-line overrides
    pub fn resolve(config: &LogConfig, level_override: Option<&str>, console: bool) -> Self {
        Self {
            level: level_override
                .map(str::to_string)
                .unwrap_or_else(|| config.level.clone()),
            dir: config.dir.clone().or_else(default_log_dir),
            file_prefix: config.file_prefix.clone(),
            console,
        }
    }

    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
    }
}

/// Install the global subscriber
///
/// The returned guard flushes the file writer when dropped and must live
/// until the process exits.
pub fn init_logging(settings: &LogSettings) -> Result<WorkerGuard, LoggingError> {
    let dir = settings.dir.clone().ok_or(LoggingError::NoLogDir)?;
    std::fs::create_dir_all(&dir).map_err(|source| LoggingError::CreateDir {
        path: dir.clone(),
        source,
    })?;

    let appender = rolling::RollingFileAppender::builder()
        .rotation(rolling::Rotation::DAILY)
        .filename_prefix(&settings.file_prefix)
        .filename_suffix("log")
        .build(&dir)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer().with_ansi(false).with_writer(writer);
    let console_layer = settings.console.then(fmt::layer);

    tracing_subscriber::registry()
        .with(settings.env_filter())
        .with(file_layer)
        .with(console_layer)
        .try_init()?;

    tracing::info!(dir = %dir.display(), level = %settings.level, "logging initialised");
    Ok(guard)
}

/// Install file logging, or a console-only subscriber when that fails
///
/// A missing or unwritable log directory does not stop the application.
pub fn init_logging_or_console(settings: &LogSettings) -> Option<WorkerGuard> {
    match init_logging(settings) {
        Ok(guard) => Some(guard),
        Err(e) => {
            let installed = tracing_subscriber::fmt()
                .with_env_filter(settings.env_filter())
                .try_init()
                .is_ok();
            if installed {
                tracing::warn!("file logging unavailable, logging to console: {}", e);
            } else {
                eprintln!("mergefsmc: logging unavailable: {}", e);
            }
            None
        }
    }
}
