//! File API configuration

/// Default handle table size, matching the C runtime's stream table
pub const DEFAULT_CAPACITY: usize = 64;

/// Construction-time settings for [`crate::FileApi`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileApiConfig {
    /// Number of handle table slots
    ///
    /// Stream ids at or above this value cannot be bound to a handle and the
    /// open fails with `ERROR_TOO_MANY_OPEN_FILES`.
    pub capacity: usize,
}

impl FileApiConfig {
    pub const fn with_capacity(capacity: usize) -> Self {
        Self { capacity }
    }
}

impl Default for FileApiConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}
