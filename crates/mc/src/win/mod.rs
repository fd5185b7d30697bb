//! Windows front end
//!
//! Wires the portable controller to LibMergeFS, the Win32 session backend,
//! message-box dialogs and the message loop.

mod engine;
mod session;
mod shell;
mod wide;
mod window;

use std::sync::Arc;

use common::controller::{Controller, ControllerOptions};
use common::engine::Engine;
use common::instance::{CoordinationError, Coordinator, InstanceNames, Role};
use common::manager::MountManager;
use common::queue::ArgBatch;

pub use engine::LibMergeFs;
pub use session::Win32Session;
pub use shell::{show_init_error, DialogShell};
pub use window::WindowSink;

/// Run this launch to completion and return the process exit code
pub fn run(args: ArgBatch, options: ControllerOptions) -> i32 {
    let coordinator = Coordinator::new(Win32Session, InstanceNames::default());
    let role = coordinator.start(args, |endpoint, args| {
        let engine = LibMergeFs::init()
            .map_err(|e| CoordinationError::Init(format!("LibMergeFS Init failed: {}", e)))?;
        let engine: Arc<dyn Engine> = Arc::new(engine);
        let manager = MountManager::new(engine);
        match manager.add_plugins_from_dir(&options.plugins_dir) {
            Ok(ids) => tracing::info!(
                dir = %options.plugins_dir.display(),
                count = ids.len(),
                "source plugins loaded"
            ),
            Err(e) => tracing::warn!("failed to load source plugins: {}", e),
        }

        let controller = Arc::new(Controller::new(
            manager,
            Arc::new(DialogShell),
            Arc::new(WindowSink::new(endpoint.hwnd())),
            options,
        ));
        window::attach(controller.clone());
        controller.submit(args);
        Ok(())
    });

    match role {
        Ok(Role::Elected(elected)) => {
            let code = window::run_message_loop();
            // releases the engine, which unmounts whatever is left
            drop(window::detach());
            drop(elected);
            code
        }
        Ok(Role::Relay { delivered }) => {
            if !delivered {
                tracing::warn!("running instance did not acknowledge the arguments");
            }
            0
        }
        Err(e) => {
            tracing::error!("start-up failed: {}", e);
            drop(window::detach());
            shell::show_init_error(&e.to_string());
            1
        }
    }
}
