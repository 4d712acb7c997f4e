//! Host stream primitive backed by `std::fs`
//!
//! Behaves like a C runtime's descriptor table: ids 0..=2 belong to the
//! standard streams, every open takes the lowest free id above them and
//! close gives it back.

use std::fs::{File, OpenOptions};
use std::io;

use crate::stream::{IdPool, OpenMode, StreamId, StreamPrimitive};

/// Ids reserved for stdin, stdout and stderr
pub const RESERVED_IDS: StreamId = 3;

/// `std::fs` stream primitive
#[derive(Debug)]
pub struct HostStreams {
    ids: IdPool,
}

impl HostStreams {
    pub fn new() -> Self {
        Self {
            ids: IdPool::new(RESERVED_IDS),
        }
    }

    /// Number of streams currently open through this primitive
    pub fn open_count(&self) -> usize {
        self.ids.live()
    }
}

impl Default for HostStreams {
    fn default() -> Self {
        Self::new()
    }
}

fn options_for(mode: OpenMode) -> OpenOptions {
    let mut options = OpenOptions::new();
    match mode {
        OpenMode::Read => {
            options.read(true);
        }
        OpenMode::ReadWrite => {
            options.read(true).write(true);
        }
        OpenMode::WriteTruncate => {
            options.write(true).create(true).truncate(true);
        }
        OpenMode::ReadWriteTruncate => {
            options.read(true).write(true).create(true).truncate(true);
        }
    }
    options
}

impl StreamPrimitive for HostStreams {
    type Stream = File;

    fn open(&mut self, path: &str, mode: OpenMode) -> io::Result<(StreamId, File)> {
        let file = options_for(mode).open(path)?;
        let id = self.ids.allocate();
        log::trace!("host open {:?} {} -> id {}", path, mode.as_str(), id);
        Ok((id, file))
    }

    fn close(&mut self, id: StreamId, stream: File) -> io::Result<()> {
        self.ids.release(id);
        // Surface deferred write errors the way fclose would
        let result = stream.sync_all();
        drop(stream);
        result
    }
}
