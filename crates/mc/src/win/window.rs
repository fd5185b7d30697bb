//! Window procedure and message loop of the elected process
//!
//! The receiving window is message-only. It gets three kinds of traffic:
//! relayed arguments (`WM_COPYDATA`), the controller's self-posted drain
//! events and menu commands (`WM_COMMAND`) from the tray UI collaborator.

use std::ffi::c_void;
use std::sync::Arc;

use parking_lot::Mutex;

use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::DataExchange::COPYDATASTRUCT;
use windows::Win32::UI::WindowsAndMessaging::{
    DefWindowProcW, DestroyWindow, DispatchMessageW, GetMessageW, PostMessageW, PostQuitMessage,
    TranslateMessage, MSG, WM_APP, WM_CLOSE, WM_COMMAND, WM_COPYDATA, WM_DESTROY,
};

use common::command::MenuCommand;
use common::controller::{Controller, Flow};
use common::events::{EventSink, UiEvent};
use common::relay::{CopyData, CopyDataReceiver};

pub const WM_DRAIN_ARGS: u32 = WM_APP + 0x1101;
pub const WM_DRAIN_ERRORS: u32 = WM_APP + 0x1102;

static CONTROLLER: Mutex<Option<Arc<Controller>>> = parking_lot::const_mutex(None);

/// Route window messages to `controller` from now on
pub fn attach(controller: Arc<Controller>) {
    if CONTROLLER.lock().replace(controller).is_some() {
        tracing::warn!("replaced an attached controller");
    }
}

/// Stop routing messages and hand the controller back
pub fn detach() -> Option<Arc<Controller>> {
    CONTROLLER.lock().take()
}

// cloned out so nested message loops in modal dialogs can re-enter
fn controller() -> Option<Arc<Controller>> {
    CONTROLLER.lock().clone()
}

/// Posts [`UiEvent`]s to the receiving window
#[derive(Debug, Clone, Copy)]
pub struct WindowSink {
    // HWND is not Send; the raw value is
    hwnd: isize,
}

impl WindowSink {
    pub fn new(hwnd: HWND) -> Self {
        Self {
            hwnd: hwnd.0 as isize,
        }
    }
}

impl EventSink for WindowSink {
    fn post(&self, event: UiEvent) -> bool {
        let message = match event {
            UiEvent::DrainArgs => WM_DRAIN_ARGS,
            UiEvent::DrainErrors => WM_DRAIN_ERRORS,
        };
        let hwnd = HWND(self.hwnd as *mut c_void);
        match unsafe { PostMessageW(hwnd, message, WPARAM(0), LPARAM(0)) } {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(?event, "PostMessageW failed: {}", e);
                false
            }
        }
    }
}

fn receive_copy_data(controller: &Controller, lparam: LPARAM) -> LRESULT {
    let data = lparam.0 as *const COPYDATASTRUCT;
    let Some(data) = (unsafe { data.as_ref() }) else {
        return LRESULT(0);
    };
    let payload = if data.lpData.is_null() || data.cbData == 0 {
        Vec::new()
    } else {
        unsafe { std::slice::from_raw_parts(data.lpData as *const u8, data.cbData as usize) }
            .to_vec()
    };
    let message = CopyData {
        kind: data.dwData,
        payload,
    };
    LRESULT(controller.receive(&message) as isize)
}

pub unsafe extern "system" fn window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    let Some(controller) = controller() else {
        return DefWindowProcW(hwnd, msg, wparam, lparam);
    };

    match msg {
        WM_COPYDATA => receive_copy_data(&controller, lparam),
        WM_DRAIN_ARGS => {
            controller.handle(UiEvent::DrainArgs);
            LRESULT(1)
        }
        WM_DRAIN_ERRORS => {
            controller.handle(UiEvent::DrainErrors);
            LRESULT(1)
        }
        // menu selections only: no control notification, no accelerator
        WM_COMMAND if lparam.0 == 0 && (wparam.0 >> 16) & 0xffff == 0 => {
            let item = (wparam.0 & 0xffff) as u32;
            match MenuCommand::decode(item) {
                Some(command) => {
                    if controller.dispatch(command) == Flow::Quit {
                        let _ = DestroyWindow(hwnd);
                    }
                    LRESULT(0)
                }
                None => DefWindowProcW(hwnd, msg, wparam, lparam),
            }
        }
        WM_CLOSE => {
            if controller.close_requested() == Flow::Quit {
                let _ = DestroyWindow(hwnd);
            }
            LRESULT(0)
        }
        WM_DESTROY => {
            controller.shutdown();
            PostQuitMessage(0);
            LRESULT(0)
        }
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

/// Pump messages until `WM_QUIT`; returns its exit code
pub fn run_message_loop() -> i32 {
    let mut msg = MSG::default();
    loop {
        let status = unsafe { GetMessageW(&mut msg, None, 0, 0) };
        match status.0 {
            0 => break,
            -1 => {
                tracing::error!("GetMessageW failed: {}", windows::core::Error::from_win32());
                return 1;
            }
            _ => unsafe {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            },
        }
    }
    tracing::info!("message loop finished");
    msg.wParam.0 as i32
}
