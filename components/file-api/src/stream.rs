//! Stream primitive abstraction
//!
//! The runtime underneath only offers C-library style streams. A
//! [`StreamPrimitive`] opens a path in one of the four `fopen` modes the
//! layer needs and hands back the stream together with the small integer id
//! the runtime assigned to it (the equivalent of `_fileno`).

use std::io::{self, Read, Seek, Write};

/// Identifier the primitive assigns to an open stream
///
/// Ids are not reused while the stream they name is open.
pub type StreamId = usize;

/// A byte stream with a file position
pub trait Stream: Read + Write + Seek + Send {}

impl<T: Read + Write + Seek + Send> Stream for T {}

/// `fopen` modes used by the handle layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
    /// `"rb"`: existing file, read only
    Read,
    /// `"rb+"`: existing file, read and write, content preserved
    ReadWrite,
    /// `"wb"`: create or truncate, write only
    WriteTruncate,
    /// `"wb+"`: create or truncate, read and write
    ReadWriteTruncate,
}

impl OpenMode {
    /// Mode string as the C runtime spells it
    pub const fn as_str(self) -> &'static str {
        match self {
            OpenMode::Read => "rb",
            OpenMode::ReadWrite => "rb+",
            OpenMode::WriteTruncate => "wb",
            OpenMode::ReadWriteTruncate => "wb+",
        }
    }

    pub const fn readable(self) -> bool {
        !matches!(self, OpenMode::WriteTruncate)
    }

    pub const fn writable(self) -> bool {
        !matches!(self, OpenMode::Read)
    }

    /// Creates the file when absent and truncates it when present
    pub const fn truncates(self) -> bool {
        matches!(self, OpenMode::WriteTruncate | OpenMode::ReadWriteTruncate)
    }
}

/// Open/close half of the stream runtime
///
/// Read, write and seek go straight through [`Stream`]; only acquiring and
/// releasing a stream (and its id) involves the primitive.
pub trait StreamPrimitive: Send {
    type Stream: Stream;

    /// Open `path` in `mode`
    ///
    /// Failures must carry a meaningful [`io::ErrorKind`]: `NotFound` for an
    /// absent path and `PermissionDenied` for a path that exists but cannot
    /// be opened in the requested mode.
    fn open(&mut self, path: &str, mode: OpenMode) -> io::Result<(StreamId, Self::Stream)>;

    /// Release a stream and its id
    fn close(&mut self, id: StreamId, stream: Self::Stream) -> io::Result<()>;
}

/// Lowest-free id allocator, the way a C runtime hands out descriptors
///
/// Ids below `first` are never issued.
#[derive(Debug, Clone)]
pub struct IdPool {
    first: StreamId,
    in_use: Vec<bool>,
}

impl IdPool {
    pub const fn new(first: StreamId) -> Self {
        Self {
            first,
            in_use: Vec::new(),
        }
    }

    pub fn allocate(&mut self) -> StreamId {
        let index = match self.in_use.iter().position(|used| !used) {
            Some(free) => {
                self.in_use[free] = true;
                free
            }
            None => {
                self.in_use.push(true);
                self.in_use.len() - 1
            }
        };
        self.first + index
    }

    pub fn release(&mut self, id: StreamId) {
        if let Some(slot) = id
            .checked_sub(self.first)
            .and_then(|index| self.in_use.get_mut(index))
        {
            *slot = false;
        }
    }

    /// Ids currently issued
    pub fn live(&self) -> usize {
        self.in_use.iter().filter(|used| **used).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_pool_reuses_lowest() {
        let mut pool = IdPool::new(3);
        assert_eq!(pool.allocate(), 3);
        assert_eq!(pool.allocate(), 4);
        assert_eq!(pool.allocate(), 5);
        pool.release(4);
        pool.release(99);
        assert_eq!(pool.live(), 2);
        assert_eq!(pool.allocate(), 4);
        assert_eq!(pool.allocate(), 6);
    }

    #[test]
    fn test_mode_strings() {
        assert_eq!(OpenMode::Read.as_str(), "rb");
        assert_eq!(OpenMode::ReadWrite.as_str(), "rb+");
        assert_eq!(OpenMode::WriteTruncate.as_str(), "wb");
        assert_eq!(OpenMode::ReadWriteTruncate.as_str(), "wb+");
    }

    #[test]
    fn test_mode_capabilities() {
        assert!(OpenMode::Read.readable() && !OpenMode::Read.writable());
        assert!(!OpenMode::WriteTruncate.readable() && OpenMode::WriteTruncate.writable());
        assert!(OpenMode::ReadWrite.readable() && OpenMode::ReadWrite.writable());
        assert!(!OpenMode::ReadWrite.truncates());
        assert!(OpenMode::ReadWriteTruncate.truncates());
    }
}
