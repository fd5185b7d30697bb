//! Core of the MergeFS mount controller
//!
//! Everything the tray application does that is not drawing UI or calling
//! Win32 lives here and runs on any platform:
//!
//! - [`config`]: mount configuration (YAML) to [`config::MountSpec`]
//! - [`engine`]: the boundary to the merging engine, plus an in-memory engine
//! - [`registry`] and [`manager`]: live mounts and their lifecycle
//! - [`queue`], [`events`] and [`controller`]: the event-loop core
//! - [`instance`] and [`relay`]: single-instance election and argument hand-off
//! - [`command`]: the menu command id contract

pub mod command;
pub mod config;
pub mod controller;
pub mod engine;
pub mod events;
pub mod instance;
pub mod manager;
pub mod queue;
pub mod registry;
pub mod relay;
pub mod workdir;
