//! MergeFSMC tray application shell
//!
//! Command-line parsing, the application config file and logging are
//! portable. The Windows-only [`win`] module binds the controller core to
//! LibMergeFS and the Win32 session.

pub mod app_config;
pub mod cli;
pub mod logging;

#[cfg(windows)]
pub mod win;
