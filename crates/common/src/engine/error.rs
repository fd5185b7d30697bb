use std::fmt;

/// Native error codes reported by the merging engine
///
/// Codes the engine documents get a name; anything else is carried through
/// numerically so no information is lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Success,
    /// The failure is an OS error; the OS code is carried separately
    WindowsError,
    GenericFailure,
    MoreData,
    IncompatiblePlatform,
    IncompatibleOsVersion,
    IncompatibleDokanVersion,
    IncompatiblePluginType,
    IncompatiblePluginVersion,
    InvalidParameter,
    InvalidPluginId,
    InvalidSourceContextId,
    InvalidMountId,
    InvalidFileContextId,
    InvalidMountPoint,
    InexistentFile,
    InexistentPlugin,
    InexistentSource,
    InexistentMount,
    AlreadyExistingFile,
    AlreadyExistingPlugin,
    AlreadyExistingSource,
    AlreadyExistingMount,
    AlreadyExistingMountPoint,
    Other(u32),
}

impl ErrorCode {
    pub fn from_raw(code: u32) -> Self {
        match code {
            0x0000_0000 => ErrorCode::Success,
            0x0000_0001 => ErrorCode::WindowsError,
            0x0001_0000 => ErrorCode::GenericFailure,
            0x0001_0001 => ErrorCode::MoreData,
            0x0002_0001 => ErrorCode::IncompatiblePlatform,
            0x0002_0002 => ErrorCode::IncompatibleOsVersion,
            0x0002_0003 => ErrorCode::IncompatibleDokanVersion,
            0x0002_0004 => ErrorCode::IncompatiblePluginType,
            0x0002_0005 => ErrorCode::IncompatiblePluginVersion,
            0x0003_0000 => ErrorCode::InvalidParameter,
            0x0003_0001 => ErrorCode::InvalidPluginId,
            0x0003_0002 => ErrorCode::InvalidSourceContextId,
            0x0003_0003 => ErrorCode::InvalidMountId,
            0x0003_0004 => ErrorCode::InvalidFileContextId,
            0x0003_0005 => ErrorCode::InvalidMountPoint,
            0x0004_0001 => ErrorCode::InexistentFile,
            0x0004_0002 => ErrorCode::InexistentPlugin,
            0x0004_0003 => ErrorCode::InexistentSource,
            0x0004_0004 => ErrorCode::InexistentMount,
            0x0005_0001 => ErrorCode::AlreadyExistingFile,
            0x0005_0002 => ErrorCode::AlreadyExistingPlugin,
            0x0005_0003 => ErrorCode::AlreadyExistingSource,
            0x0005_0004 => ErrorCode::AlreadyExistingMount,
            0x0005_0005 => ErrorCode::AlreadyExistingMountPoint,
            other => ErrorCode::Other(other),
        }
    }

    pub fn as_raw(&self) -> u32 {
        match self {
            ErrorCode::Success => 0x0000_0000,
            ErrorCode::WindowsError => 0x0000_0001,
            ErrorCode::GenericFailure => 0x0001_0000,
            ErrorCode::MoreData => 0x0001_0001,
            ErrorCode::IncompatiblePlatform => 0x0002_0001,
            ErrorCode::IncompatibleOsVersion => 0x0002_0002,
            ErrorCode::IncompatibleDokanVersion => 0x0002_0003,
            ErrorCode::IncompatiblePluginType => 0x0002_0004,
            ErrorCode::IncompatiblePluginVersion => 0x0002_0005,
            ErrorCode::InvalidParameter => 0x0003_0000,
            ErrorCode::InvalidPluginId => 0x0003_0001,
            ErrorCode::InvalidSourceContextId => 0x0003_0002,
            ErrorCode::InvalidMountId => 0x0003_0003,
            ErrorCode::InvalidFileContextId => 0x0003_0004,
            ErrorCode::InvalidMountPoint => 0x0003_0005,
            ErrorCode::InexistentFile => 0x0004_0001,
            ErrorCode::InexistentPlugin => 0x0004_0002,
            ErrorCode::InexistentSource => 0x0004_0003,
            ErrorCode::InexistentMount => 0x0004_0004,
            ErrorCode::AlreadyExistingFile => 0x0005_0001,
            ErrorCode::AlreadyExistingPlugin => 0x0005_0002,
            ErrorCode::AlreadyExistingSource => 0x0005_0003,
            ErrorCode::AlreadyExistingMount => 0x0005_0004,
            ErrorCode::AlreadyExistingMountPoint => 0x0005_0005,
            ErrorCode::Other(code) => *code,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ErrorCode::Success => "success",
            ErrorCode::WindowsError => "windows error",
            ErrorCode::GenericFailure => "generic failure",
            ErrorCode::MoreData => "more data",
            ErrorCode::IncompatiblePlatform => "incompatible platform",
            ErrorCode::IncompatibleOsVersion => "incompatible OS version",
            ErrorCode::IncompatibleDokanVersion => "incompatible Dokan version",
            ErrorCode::IncompatiblePluginType => "incompatible plugin type",
            ErrorCode::IncompatiblePluginVersion => "incompatible plugin version",
            ErrorCode::InvalidParameter => "invalid parameter",
            ErrorCode::InvalidPluginId => "invalid plugin id",
            ErrorCode::InvalidSourceContextId => "invalid source context id",
            ErrorCode::InvalidMountId => "invalid mount id",
            ErrorCode::InvalidFileContextId => "invalid file context id",
            ErrorCode::InvalidMountPoint => "invalid mount point",
            ErrorCode::InexistentFile => "inexistent file",
            ErrorCode::InexistentPlugin => "inexistent plugin",
            ErrorCode::InexistentSource => "inexistent source",
            ErrorCode::InexistentMount => "inexistent mount",
            ErrorCode::AlreadyExistingFile => "already existing file",
            ErrorCode::AlreadyExistingPlugin => "already existing plugin",
            ErrorCode::AlreadyExistingSource => "already existing source",
            ErrorCode::AlreadyExistingMount => "already existing mount",
            ErrorCode::AlreadyExistingMountPoint => "already existing mount point",
            ErrorCode::Other(_) => "unknown error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A failed call into the engine
///
/// Carries the engine's own code and, when the engine reports an OS-level
/// failure, the OS error code as well. `message()` renders both into the
/// text shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", self.message())]
pub struct EngineError {
    pub code: ErrorCode,
    pub os_code: Option<u32>,
}

impl EngineError {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            os_code: None,
        }
    }

    /// An OS-level failure reported through the engine
    pub fn os(os_code: u32) -> Self {
        Self {
            code: ErrorCode::WindowsError,
            os_code: Some(os_code),
        }
    }

    pub fn is_os_error(&self) -> bool {
        self.code == ErrorCode::WindowsError
    }

    pub fn message(&self) -> String {
        match (self.code, self.os_code) {
            (ErrorCode::WindowsError, Some(os_code)) => format!("Win32 Error {}", os_code),
            (ErrorCode::WindowsError, None) => "Win32 Error (unknown code)".to_string(),
            (ErrorCode::Other(raw), _) => format!("MergeFS Error {}", raw),
            (code, _) => format!("MergeFS Error {} ({})", code.as_raw(), code),
        }
    }
}

impl From<ErrorCode> for EngineError {
    fn from(code: ErrorCode) -> Self {
        Self::new(code)
    }
}
