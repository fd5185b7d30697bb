//! Argument relay between launches
//!
//! A relay process hands its argument list to the elected process as one
//! copy-data message: a numeric kind discriminator plus a UTF-8 JSON array of
//! strings. The elected side decodes it into a new argument batch. Anything
//! it cannot decode is answered with "not handled" and otherwise ignored.

use std::path::Path;

use crate::queue::ArgBatch;

/// Discriminator carried alongside the copy-data payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum CopyDataKind {
    SecondInstanceLaunched = 1,
}

impl CopyDataKind {
    pub fn from_raw(raw: usize) -> Option<Self> {
        match raw {
            1 => Some(CopyDataKind::SecondInstanceLaunched),
            _ => None,
        }
    }

    pub fn as_raw(self) -> usize {
        self as usize
    }
}

/// Copy-data message as it crosses the process boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyData {
    pub kind: usize,
    pub payload: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("unknown copy-data kind: {0}")]
    UnknownKind(usize),
    #[error("malformed argument payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Receives copy-data messages on the elected side
///
/// Returns whether the message was handled. Must not panic on any input.
pub trait CopyDataReceiver: Send + Sync {
    fn receive(&self, message: &CopyData) -> bool;
}

/// Build the message announcing a second launch with `args`
pub fn encode_args(args: &[String]) -> Result<CopyData, RelayError> {
    Ok(CopyData {
        kind: CopyDataKind::SecondInstanceLaunched.as_raw(),
        payload: serde_json::to_vec(args)?,
    })
}

/// Decode a second-launch message back into an argument batch
pub fn decode_args(message: &CopyData) -> Result<ArgBatch, RelayError> {
    match CopyDataKind::from_raw(message.kind) {
        Some(CopyDataKind::SecondInstanceLaunched) => Ok(serde_json::from_slice(&message.payload)?),
        None => Err(RelayError::UnknownKind(message.kind)),
    }
}

/// Resolve every argument to an absolute path against `cwd`
///
/// Empty arguments stay empty.
pub fn absolutize_args<I, S>(args: I, cwd: &Path) -> ArgBatch
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    args.into_iter()
        .map(|arg| {
            let arg = arg.as_ref();
            if arg.is_empty() || Path::new(arg).is_absolute() {
                arg.to_string()
            } else {
                cwd.join(arg).to_string_lossy().into_owned()
            }
        })
        .collect()
}
