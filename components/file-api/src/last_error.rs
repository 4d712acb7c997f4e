//! Process-wide last-error cell
//!
//! Backs `GetLastError`/`SetLastError`. Written by every failing operation
//! and by the two informational open outcomes; never cleared automatically.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::error::ErrorCode;

/// Last-error scalar shared by every operation of one [`crate::FileApi`]
#[derive(Debug)]
pub struct LastError {
    code: AtomicU32,
}

impl LastError {
    /// Create a cell holding `ERROR_SUCCESS`
    pub const fn new() -> Self {
        Self {
            code: AtomicU32::new(ErrorCode::SUCCESS.raw()),
        }
    }

    /// Overwrite the current code
    #[inline]
    pub fn set(&self, code: ErrorCode) {
        self.code.store(code.raw(), Ordering::SeqCst);
    }

    /// Read the current code without modifying it
    #[inline]
    pub fn get(&self) -> ErrorCode {
        ErrorCode(self.code.load(Ordering::SeqCst))
    }
}

impl Default for LastError {
    fn default() -> Self {
        Self::new()
    }
}
