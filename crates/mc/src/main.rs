#![cfg_attr(all(windows, not(debug_assertions)), windows_subsystem = "windows")]

use anyhow::Context;
use clap::Parser;

use mergefs_mc::app_config::AppConfig;
use mergefs_mc::cli::Args;
use mergefs_mc::logging::{init_logging_or_console, LogSettings};

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if e.use_stderr() => {
            report_start_failure(&e.to_string());
            std::process::exit(2);
        }
        Err(e) => e.exit(),
    };
    match run(args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!("start-up failed: {:#}", e);
            report_start_failure(&format!("{:#}", e));
            std::process::exit(1);
        }
    }
}

/// The release build has no console, so start-up errors get a dialog
#[cfg(windows)]
fn report_start_failure(message: &str) {
    eprintln!("mergefsmc: {}", message);
    mergefs_mc::win::show_init_error(message);
}

#[cfg(not(windows))]
fn report_start_failure(message: &str) {
    eprintln!("mergefsmc: {}", message);
}

fn run(args: Args) -> anyhow::Result<i32> {
    let config = AppConfig::load(args.config.as_deref()).context("failed to load config")?;
    let settings = LogSettings::resolve(&config.log, args.log_level.as_deref(), args.foreground);
    let _guard = init_logging_or_console(&settings);

    let exe = std::env::current_exe().context("failed to locate executable")?;
    let cwd = std::env::current_dir().context("failed to read working directory")?;
    let batch = common::relay::absolutize_args(args.launch_batch(&exe), &cwd);
    tracing::info!(args = ?batch, "starting");

    launch(batch, &config, &exe)
}

#[cfg(windows)]
fn launch(batch: Vec<String>, config: &AppConfig, exe: &std::path::Path) -> anyhow::Result<i32> {
    let options = common::controller::ControllerOptions {
        plugins_dir: config.plugins_dir_for(exe),
        safe_unmount_on_exit: config.safe_unmount_on_exit,
    };
    Ok(mergefs_mc::win::run(batch, options))
}

#[cfg(not(windows))]
fn launch(batch: Vec<String>, _config: &AppConfig, _exe: &std::path::Path) -> anyhow::Result<i32> {
    tracing::error!(count = batch.len(), "no mount engine on this platform");
    anyhow::bail!("unsupported platform: MergeFSMC requires Windows")
}
