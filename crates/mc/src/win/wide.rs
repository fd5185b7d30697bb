//! UTF-16 and ANSI string helpers for the Win32 boundary

use windows::core::{PCSTR, PCWSTR};

/// Copy a NUL-terminated wide string; null reads as empty
///
/// # Safety
///
/// `ptr` must be null or point to a valid NUL-terminated UTF-16 string.
pub unsafe fn read_pcwstr(ptr: PCWSTR) -> String {
    if ptr.is_null() {
        return String::new();
    }
    String::from_utf16_lossy(ptr.as_wide())
}

/// Copy a NUL-terminated narrow string as UTF-8; null reads as empty
///
/// # Safety
///
/// `ptr` must be null or point to a valid NUL-terminated byte string.
pub unsafe fn read_pcstr(ptr: PCSTR) -> String {
    if ptr.is_null() {
        return String::new();
    }
    String::from_utf8_lossy(ptr.as_bytes()).into_owned()
}

/// Wide buffer with a terminating NUL and room for `capacity` characters
pub fn buffer(capacity: usize) -> Vec<u16> {
    vec![0u16; capacity + 1]
}

/// Text up to the first NUL of a wide buffer
pub fn from_buffer(buffer: &[u16]) -> String {
    let len = buffer.iter().position(|c| *c == 0).unwrap_or(buffer.len());
    String::from_utf16_lossy(&buffer[..len])
}

/// Encode a dialog filter: pairs of label and pattern, double-NUL terminated
pub fn filter(pairs: &[(&str, &str)]) -> Vec<u16> {
    let mut out = Vec::new();
    for (label, pattern) in pairs {
        out.extend(label.encode_utf16());
        out.push(0);
        out.extend(pattern.encode_utf16());
        out.push(0);
    }
    out.push(0);
    out
}
