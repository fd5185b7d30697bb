//! Win32 implementation of the controller's user-facing side effects

use std::path::{Path, PathBuf};

use windows::core::{w, HSTRING, PCWSTR, PWSTR};
use windows::Win32::Foundation::MAX_PATH;
use windows::Win32::Media::Audio::{PlaySoundW, SND_ALIAS, SND_ASYNC, SND_NODEFAULT};
use windows::Win32::UI::Controls::Dialogs::{
    GetOpenFileNameW, OFN_FILEMUSTEXIST, OFN_NOCHANGEDIR, OFN_PATHMUSTEXIST, OPENFILENAMEW,
};
use windows::Win32::UI::Shell::ShellExecuteW;
use windows::Win32::UI::WindowsAndMessaging::{
    MessageBoxW, IDOK, MB_ICONERROR, MB_ICONINFORMATION, MB_ICONQUESTION, MB_OK, MB_OKCANCEL,
    MB_SETFOREGROUND, MB_SYSTEMMODAL, SW_SHOWDEFAULT,
};

use common::controller::{Shell, SystemSound, ERROR_TITLE};

use super::wide;

const CONFIG_FILTER: [(&str, &str); 2] = [
    ("MergeFSMC Configuration File (*.mfcfg)", "*.mfcfg"),
    ("All Files (*.*)", "*.*"),
];

/// Message boxes, Explorer and system sounds
#[derive(Debug, Default, Clone, Copy)]
pub struct DialogShell;

fn shell_execute(operation: PCWSTR, file: &HSTRING, parameters: Option<&HSTRING>) -> bool {
    let parameters = parameters.map_or(PCWSTR::null(), |p| PCWSTR(p.as_ptr()));
    let result = unsafe {
        ShellExecuteW(
            None,
            operation,
            file,
            parameters,
            PCWSTR::null(),
            SW_SHOWDEFAULT,
        )
    };
    // values above 32 mean success
    result.0 as isize > 32
}

impl Shell for DialogShell {
    fn show_error(&self, title: &str, message: &str) {
        unsafe {
            MessageBoxW(
                None,
                &HSTRING::from(message),
                &HSTRING::from(title),
                MB_OK | MB_ICONERROR | MB_SETFOREGROUND | MB_SYSTEMMODAL,
            );
        }
    }

    fn show_info(&self, title: &str, message: &str) {
        unsafe {
            MessageBoxW(
                None,
                &HSTRING::from(message),
                &HSTRING::from(title),
                MB_OK | MB_ICONINFORMATION | MB_SETFOREGROUND,
            );
        }
    }

    fn confirm(&self, title: &str, message: &str) -> bool {
        let answer = unsafe {
            MessageBoxW(
                None,
                &HSTRING::from(message),
                &HSTRING::from(title),
                MB_OKCANCEL | MB_ICONQUESTION | MB_SETFOREGROUND,
            )
        };
        answer == IDOK
    }

    fn explore(&self, path: &Path) -> bool {
        shell_execute(w!("explore"), &HSTRING::from(path.as_os_str()), None)
    }

    fn reveal(&self, path: &Path) -> bool {
        let argument = HSTRING::from(format!("/select,\"{}\"", path.display()));
        shell_execute(w!("open"), &HSTRING::from("explorer.exe"), Some(&argument))
    }

    fn pick_config_file(&self) -> Option<PathBuf> {
        let filter = wide::filter(&CONFIG_FILTER);
        let mut file = wide::buffer(MAX_PATH as usize);
        let mut dialog = OPENFILENAMEW {
            lStructSize: std::mem::size_of::<OPENFILENAMEW>() as u32,
            lpstrFilter: PCWSTR(filter.as_ptr()),
            lpstrFile: PWSTR(file.as_mut_ptr()),
            nMaxFile: file.len() as u32,
            lpstrDefExt: w!("mfcfg"),
            Flags: OFN_FILEMUSTEXIST | OFN_PATHMUSTEXIST | OFN_NOCHANGEDIR,
            ..Default::default()
        };
        if !unsafe { GetOpenFileNameW(&mut dialog) }.as_bool() {
            return None;
        }
        let picked = wide::from_buffer(&file);
        (!picked.is_empty()).then(|| PathBuf::from(picked))
    }

    fn play_sound(&self, sound: SystemSound) {
        let alias = match sound {
            SystemSound::DeviceConnect => w!("DeviceConnect"),
            SystemSound::DeviceDisconnect => w!("DeviceDisconnect"),
        };
        unsafe {
            let _ = PlaySoundW(alias, None, SND_ALIAS | SND_ASYNC | SND_NODEFAULT);
        }
    }
}

/// Blocking dialog for a fatal start-up failure
pub fn show_init_error(message: &str) {
    DialogShell.show_error(ERROR_TITLE, &format!("Initialization error: {}", message));
}
