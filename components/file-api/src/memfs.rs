//! In-memory stream primitive
//!
//! A flat namespace of byte buffers with a per-file read-only attribute.
//! Clones share the same namespace, so a caller can keep one clone to
//! inspect or seed files while a [`crate::FileApi`] owns another.

use std::collections::HashMap;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use spin::Mutex;

use crate::stream::{IdPool, OpenMode, StreamId, StreamPrimitive};

type Contents = Arc<Mutex<Vec<u8>>>;

#[derive(Debug, Clone)]
enum Node {
    File { data: Contents, read_only: bool },
    /// Exists but every open fails with an error other than not-found
    Locked,
}

#[derive(Debug, Default)]
struct Namespace {
    nodes: HashMap<String, Node>,
}

/// In-memory stream primitive
#[derive(Debug, Clone)]
pub struct MemStreams {
    namespace: Arc<Mutex<Namespace>>,
    ids: IdPool,
}

impl MemStreams {
    pub fn new() -> Self {
        Self {
            namespace: Arc::new(Mutex::new(Namespace::default())),
            ids: IdPool::new(crate::host::RESERVED_IDS),
        }
    }

    /// Create or replace a writable file
    pub fn insert(&self, path: &str, contents: &[u8]) {
        self.insert_node(path, contents, false);
    }

    /// Create or replace a read-only file
    pub fn insert_read_only(&self, path: &str, contents: &[u8]) {
        self.insert_node(path, contents, true);
    }

    /// Create a path that exists but cannot be opened at all
    pub fn insert_locked(&self, path: &str) {
        self.namespace
            .lock()
            .nodes
            .insert(path.to_string(), Node::Locked);
    }

    pub fn exists(&self, path: &str) -> bool {
        self.namespace.lock().nodes.contains_key(path)
    }

    /// Snapshot of a file's bytes
    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        match self.namespace.lock().nodes.get(path)? {
            Node::File { data, .. } => Some(data.lock().clone()),
            Node::Locked => None,
        }
    }

    /// Streams opened through this clone and not yet closed
    pub fn open_count(&self) -> usize {
        self.ids.live()
    }

    fn insert_node(&self, path: &str, contents: &[u8], read_only: bool) {
        let node = Node::File {
            data: Arc::new(Mutex::new(contents.to_vec())),
            read_only,
        };
        self.namespace.lock().nodes.insert(path.to_string(), node);
    }
}

impl Default for MemStreams {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamPrimitive for MemStreams {
    type Stream = MemStream;

    fn open(&mut self, path: &str, mode: OpenMode) -> io::Result<(StreamId, MemStream)> {
        let data = {
            let mut namespace = self.namespace.lock();
            match namespace.nodes.get(path) {
                Some(Node::Locked) => {
                    return Err(io::Error::new(io::ErrorKind::Other, "path is locked"));
                }
                Some(Node::File { read_only: true, .. }) if mode.writable() => {
                    return Err(io::Error::from(io::ErrorKind::PermissionDenied));
                }
                Some(Node::File { data, .. }) => {
                    if mode.truncates() {
                        data.lock().clear();
                    }
                    data.clone()
                }
                None if mode.truncates() => {
                    let data: Contents = Arc::new(Mutex::new(Vec::new()));
                    namespace.nodes.insert(
                        path.to_string(),
                        Node::File {
                            data: data.clone(),
                            read_only: false,
                        },
                    );
                    data
                }
                None => return Err(io::Error::from(io::ErrorKind::NotFound)),
            }
        };

        let id = self.ids.allocate();
        log::trace!("memfs open {:?} {} -> id {}", path, mode.as_str(), id);
        Ok((
            id,
            MemStream {
                data,
                position: 0,
                mode,
            },
        ))
    }

    fn close(&mut self, id: StreamId, stream: MemStream) -> io::Result<()> {
        self.ids.release(id);
        drop(stream);
        Ok(())
    }
}

/// Open in-memory stream
#[derive(Debug)]
pub struct MemStream {
    data: Contents,
    position: u64,
    mode: OpenMode,
}

fn bad_descriptor(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("stream not opened for {}", what))
}

impl Read for MemStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.mode.readable() {
            return Err(bad_descriptor("reading"));
        }
        let data = self.data.lock();
        let start = usize::try_from(self.position).unwrap_or(usize::MAX).min(data.len());
        let count = buf.len().min(data.len() - start);
        buf[..count].copy_from_slice(&data[start..start + count]);
        self.position += count as u64;
        Ok(count)
    }
}

impl Write for MemStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.mode.writable() {
            return Err(bad_descriptor("writing"));
        }
        let end = usize::try_from(self.position)
            .ok()
            .and_then(|start| start.checked_add(buf.len()))
            .filter(|&end| end <= isize::MAX as usize)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "position out of range"))?;
        let start = end - buf.len();
        let mut data = self.data.lock();
        if data.len() < end {
            // Writing past the end zero-fills the gap
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);
        self.position = end as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (base, offset) = match pos {
            SeekFrom::Start(target) => {
                self.position = target;
                return Ok(target);
            }
            SeekFrom::Current(offset) => (self.position, offset),
            SeekFrom::End(offset) => (self.data.lock().len() as u64, offset),
        };
        match base.checked_add_signed(offset) {
            Some(target) => {
                self.position = target;
                Ok(target)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }
}
