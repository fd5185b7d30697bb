//! Win32 session backend: named mutex plus a message-only window

use std::ffi::c_void;

use windows::core::{HSTRING, PCWSTR};
use windows::Win32::Foundation::{
    CloseHandle, GetLastError, ReleaseMutex, ERROR_ALREADY_EXISTS, HANDLE, HWND, LPARAM, WPARAM,
};
use windows::Win32::System::DataExchange::COPYDATASTRUCT;
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::CreateMutexW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DestroyWindow, FindWindowExW, IsWindow, RegisterClassExW, SendMessageW,
    SetWindowTextW, HWND_MESSAGE, WINDOW_EX_STYLE, WINDOW_STYLE, WM_COPYDATA, WNDCLASSEXW,
};

use common::instance::{Acquired, CoordinationError, SessionBackend};
use common::relay::CopyData;

use super::window;

/// Keeps the election mutex owned until dropped
pub struct MutexGuard {
    handle: HANDLE,
}

impl Drop for MutexGuard {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = ReleaseMutex(self.handle) {
                tracing::warn!("failed to release election mutex: {}", e);
            }
            let _ = CloseHandle(self.handle);
        }
    }
}

/// The elected process's receiving window
pub struct Endpoint {
    hwnd: HWND,
}

impl Endpoint {
    pub fn hwnd(&self) -> HWND {
        self.hwnd
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        unsafe {
            // the message loop may already have destroyed it
            if IsWindow(self.hwnd).as_bool() {
                let _ = DestroyWindow(self.hwnd);
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Win32Session;

impl SessionBackend for Win32Session {
    type Guard = MutexGuard;
    type Endpoint = Endpoint;
    type Target = HWND;

    fn acquire(&self, mutex_name: &str) -> Result<Acquired<MutexGuard>, CoordinationError> {
        let name = HSTRING::from(mutex_name);
        let handle = unsafe { CreateMutexW(None, true, &name) }
            .map_err(|e| CoordinationError::Election(e.to_string()))?;
        if unsafe { GetLastError() } == ERROR_ALREADY_EXISTS {
            unsafe {
                let _ = CloseHandle(handle);
            }
            return Ok(Acquired::Existing);
        }
        Ok(Acquired::Owned(MutexGuard { handle }))
    }

    fn open_endpoint(&self, class: &str, title: &str) -> Result<Endpoint, CoordinationError> {
        let instance = unsafe { GetModuleHandleW(None) }
            .map_err(|e| CoordinationError::Endpoint(format!("GetModuleHandleW: {}", e)))?;
        let class_name = HSTRING::from(class);

        let class_info = WNDCLASSEXW {
            cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
            lpfnWndProc: Some(window::window_proc),
            hInstance: instance.into(),
            lpszClassName: PCWSTR(class_name.as_ptr()),
            ..Default::default()
        };
        if unsafe { RegisterClassExW(&class_info) } == 0 {
            let e = windows::core::Error::from_win32();
            return Err(CoordinationError::Endpoint(format!("RegisterClassExW: {}", e)));
        }

        let hwnd = unsafe {
            CreateWindowExW(
                WINDOW_EX_STYLE::default(),
                &class_name,
                &HSTRING::from(title),
                WINDOW_STYLE::default(),
                0,
                0,
                0,
                0,
                HWND_MESSAGE,
                None,
                instance,
                None,
            )
        }
        .map_err(|e| CoordinationError::Endpoint(format!("CreateWindowExW: {}", e)))?;
        tracing::debug!(class, title, "receiving window created");
        Ok(Endpoint { hwnd })
    }

    fn publish(&self, endpoint: &Endpoint, ready_title: &str) -> Result<(), CoordinationError> {
        unsafe { SetWindowTextW(endpoint.hwnd, &HSTRING::from(ready_title)) }
            .map_err(|e| CoordinationError::Publish(format!("SetWindowTextW: {}", e)))
    }

    fn find(&self, class: &str, ready_title: &str) -> Option<HWND> {
        unsafe {
            FindWindowExW(
                HWND_MESSAGE,
                None,
                &HSTRING::from(class),
                &HSTRING::from(ready_title),
            )
        }
        .ok()
    }

    fn send(&self, target: &HWND, message: &CopyData) -> Result<bool, CoordinationError> {
        let len = u32::try_from(message.payload.len())
            .map_err(|_| CoordinationError::Send("payload too large".to_string()))?;
        let data = COPYDATASTRUCT {
            dwData: message.kind,
            cbData: len,
            lpData: message.payload.as_ptr() as *mut c_void,
        };
        let result = unsafe {
            SendMessageW(
                *target,
                WM_COPYDATA,
                WPARAM(0),
                LPARAM(&data as *const COPYDATASTRUCT as isize),
            )
        };
        Ok(result.0 != 0)
    }
}
