//! Error codes and error types
//!
//! Two layers: [`ErrorCode`] is the numeric Win32 code stored in the
//! last-error cell, [`FileApiError`] is the Rust-side hard failure that the
//! `try_*` operations return. Every `FileApiError` maps to exactly one code.

use core::fmt;

use thiserror::Error;

/// Win32 error code as seen through `GetLastError`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ErrorCode(pub u32);

impl ErrorCode {
    pub const SUCCESS: Self = Self(0);
    pub const FILE_NOT_FOUND: Self = Self(2);
    pub const TOO_MANY_OPEN_FILES: Self = Self(4);
    pub const ACCESS_DENIED: Self = Self(5);
    pub const INVALID_HANDLE: Self = Self(6);
    pub const GEN_FAILURE: Self = Self(31);
    pub const FILE_EXISTS: Self = Self(80);
    pub const INVALID_PARAMETER: Self = Self(87);
    pub const NEGATIVE_SEEK: Self = Self(131);
    pub const ALREADY_EXISTS: Self = Self(183);

    /// Raw numeric value
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Symbolic Win32 name, if this is one of the codes the layer produces
    pub const fn name(self) -> Option<&'static str> {
        match self.0 {
            0 => Some("ERROR_SUCCESS"),
            2 => Some("ERROR_FILE_NOT_FOUND"),
            4 => Some("ERROR_TOO_MANY_OPEN_FILES"),
            5 => Some("ERROR_ACCESS_DENIED"),
            6 => Some("ERROR_INVALID_HANDLE"),
            31 => Some("ERROR_GEN_FAILURE"),
            80 => Some("ERROR_FILE_EXISTS"),
            87 => Some("ERROR_INVALID_PARAMETER"),
            131 => Some("ERROR_NEGATIVE_SEEK"),
            183 => Some("ERROR_ALREADY_EXISTS"),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", name, self.0),
            None => write!(f, "{}", self.0),
        }
    }
}

impl From<u32> for ErrorCode {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl From<ErrorCode> for u32 {
    fn from(code: ErrorCode) -> Self {
        code.0
    }
}

/// Hard failures of the file API
#[derive(Debug, Error)]
pub enum FileApiError {
    #[error("Invalid creation disposition: {raw}")]
    InvalidDisposition { raw: u32 },

    #[error("Invalid file name")]
    InvalidFileName,

    #[error("Invalid handle: {raw:#x}")]
    InvalidHandle { raw: u64 },

    #[error("Access denied")]
    AccessDenied,

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("File exists: {path}")]
    FileExists { path: String },

    #[error("Failed to open {path} with mode {mode}: {source}")]
    OpenFailed {
        path: String,
        mode: &'static str,
        /// Informational code the decision procedure left, if any
        note: Option<ErrorCode>,
        #[source]
        source: std::io::Error,
    },

    #[error("Handle table exhausted (capacity {capacity})")]
    TooManyOpenFiles { capacity: usize },

    #[error("Seek to negative position")]
    NegativeSeek,

    #[error("Stream I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FileApiError {
    /// Code written to the last-error cell for this failure
    pub fn code(&self) -> ErrorCode {
        match self {
            FileApiError::InvalidDisposition { .. } | FileApiError::InvalidFileName => {
                ErrorCode::INVALID_PARAMETER
            }
            FileApiError::InvalidHandle { .. } => ErrorCode::INVALID_HANDLE,
            FileApiError::AccessDenied => ErrorCode::ACCESS_DENIED,
            FileApiError::FileNotFound { .. } => ErrorCode::FILE_NOT_FOUND,
            FileApiError::FileExists { .. } => ErrorCode::FILE_EXISTS,
            FileApiError::OpenFailed { note, .. } => note.unwrap_or(ErrorCode::GEN_FAILURE),
            FileApiError::TooManyOpenFiles { .. } => ErrorCode::TOO_MANY_OPEN_FILES,
            FileApiError::NegativeSeek => ErrorCode::NEGATIVE_SEEK,
            FileApiError::Io(_) => ErrorCode::GEN_FAILURE,
        }
    }
}

pub type Result<T> = core::result::Result<T, FileApiError>;
