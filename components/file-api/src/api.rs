//! Win32 file API surface
//!
//! Every operation comes in two shapes:
//! - `try_*` returns a [`Result`] and never touches the last-error cell
//! - the Win32-shaped form (`create_file`, `read_file`, ...) returns the
//!   host API's boolean or sentinel and records the failure code
//!
//! The Win32-shaped forms write the last-error cell only on failure, plus
//! the informational codes an otherwise successful `create_file` can leave.

use std::io::{self, Read, Seek, Write};

use log::{debug, warn};
use spin::Mutex;
use static_assertions::assert_impl_all;

use crate::access::{DesiredAccess, Disposition, MoveMethod};
use crate::config::FileApiConfig;
use crate::disposition::{Probe, Request, Verdict};
use crate::error::{ErrorCode, FileApiError, Result};
use crate::handle::{Handle, HandleTable, INVALID_HANDLE_VALUE};
use crate::host::HostStreams;
use crate::last_error::LastError;
use crate::memfs::MemStreams;
use crate::stream::StreamPrimitive;

/// Failure sentinel of `set_file_pointer`
pub const INVALID_SET_FILE_POINTER: u32 = u32::MAX;

/// `FILE_FLAG_OVERLAPPED`; asynchronous I/O is not emulated
const FILE_FLAG_OVERLAPPED: u32 = 0x4000_0000;

/// Successful `try_create_file`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opened {
    pub handle: Handle,
    /// Informational code to leave in the last-error cell
    pub note: Option<ErrorCode>,
}

/// Combine the split `SetFilePointer` distance into one signed offset
#[inline]
pub fn join_distance(low: i32, high: i32) -> i64 {
    (i64::from(high) << 32) | i64::from(low as u32)
}

/// File API context: handle table, last-error cell and stream primitive
///
/// Table and primitive each sit behind a lock; when both are needed the
/// table is locked first.
pub struct FileApi<P: StreamPrimitive> {
    table: Mutex<HandleTable<P::Stream>>,
    primitive: Mutex<P>,
    last_error: LastError,
}

assert_impl_all!(FileApi<HostStreams>: Send, Sync);
assert_impl_all!(FileApi<MemStreams>: Send, Sync);

impl<P: StreamPrimitive> FileApi<P> {
    pub fn new(primitive: P) -> Self {
        Self::with_config(primitive, FileApiConfig::default())
    }

    pub fn with_config(primitive: P, config: FileApiConfig) -> Self {
        Self {
            table: Mutex::new(HandleTable::new(config.capacity)),
            primitive: Mutex::new(primitive),
            last_error: LastError::new(),
        }
    }

    /// `GetLastError`
    pub fn get_last_error(&self) -> ErrorCode {
        self.last_error.get()
    }

    /// `SetLastError`
    pub fn set_last_error(&self, code: ErrorCode) {
        self.last_error.set(code);
    }

    /// Live handle count
    pub fn open_handles(&self) -> usize {
        self.table.lock().live_count()
    }

    /// Handle table capacity
    pub fn capacity(&self) -> usize {
        self.table.lock().capacity()
    }

    /// Creation disposition a live handle was opened with
    pub fn disposition_of(&self, handle: Handle) -> Result<Disposition> {
        Ok(self.table.lock().get(handle)?.disposition())
    }

    /// Run `f` against the stream primitive
    pub fn with_primitive<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        f(&mut self.primitive.lock())
    }

    fn record<T>(&self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                debug!("file api failure: {} -> {}", err, err.code());
                self.last_error.set(err.code());
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // CreateFile
    // ------------------------------------------------------------------

    /// Open or create `path`
    ///
    /// `disposition` is the raw Win32 value so out-of-range values can be
    /// rejected before any filesystem access. `flags` is accepted and
    /// ignored.
    pub fn try_create_file(
        &self,
        path: &str,
        access: DesiredAccess,
        disposition: u32,
        flags: u32,
    ) -> Result<Opened> {
        let disposition = Disposition::try_from(disposition)?;
        if flags & FILE_FLAG_OVERLAPPED != 0 {
            debug!("ignoring FILE_FLAG_OVERLAPPED for {:?}", path);
        }

        let mut table = self.table.lock();
        let mut primitive = self.primitive.lock();

        let probe = Probe::run(&mut *primitive, path);
        let request = Request {
            disposition,
            access,
            probe,
        };

        let (mode, note) = match Verdict::decide(&request) {
            Verdict::Refuse(refusal) => return Err(refusal.into_error(path)),
            Verdict::Proceed { mode, note } => (mode, note),
        };

        let (id, stream) = primitive
            .open(path, mode)
            .map_err(|source| FileApiError::OpenFailed {
                path: path.to_string(),
                mode: mode.as_str(),
                note,
                source,
            })?;

        if let Err(err) = table.check_vacant(id) {
            warn!("no handle slot for stream id {} ({}): {}", id, path, err);
            if let Err(close_err) = primitive.close(id, stream) {
                warn!("closing unbound stream {} failed: {}", id, close_err);
            }
            return Err(err);
        }
        let handle = table.insert(id, stream, access, disposition)?;

        debug!(
            "create_file {:?} {:?} {:?} mode {} -> {:#x} note {:?}",
            path,
            disposition,
            access,
            mode.as_str(),
            handle.raw(),
            note
        );
        Ok(Opened { handle, note })
    }

    /// `CreateFileA`
    ///
    /// Returns [`INVALID_HANDLE_VALUE`] on failure. A successful open may
    /// still leave `ERROR_ALREADY_EXISTS` or `ERROR_ACCESS_DENIED` in the
    /// last-error cell.
    pub fn create_file(
        &self,
        path: &str,
        access: DesiredAccess,
        _share_mode: u32,
        disposition: u32,
        flags: u32,
    ) -> Handle {
        match self.try_create_file(path, access, disposition, flags) {
            Ok(opened) => {
                if let Some(note) = opened.note {
                    self.last_error.set(note);
                }
                opened.handle
            }
            Err(err) => {
                debug!("create_file {:?} failed: {}", path, err);
                self.last_error.set(err.code());
                INVALID_HANDLE_VALUE
            }
        }
    }

    /// Wide-character form of [`FileApi::try_create_file`]
    ///
    /// The name ends at the first NUL or at the end of the slice.
    pub fn try_create_file_w(
        &self,
        path: &[u16],
        access: DesiredAccess,
        disposition: u32,
        flags: u32,
    ) -> Result<Opened> {
        let path = narrow_path(path)?;
        self.try_create_file(&path, access, disposition, flags)
    }

    /// `CreateFileW`
    pub fn create_file_w(
        &self,
        path: &[u16],
        access: DesiredAccess,
        share_mode: u32,
        disposition: u32,
        flags: u32,
    ) -> Handle {
        match narrow_path(path) {
            Ok(path) => self.create_file(&path, access, share_mode, disposition, flags),
            Err(err) => {
                self.last_error.set(err.code());
                INVALID_HANDLE_VALUE
            }
        }
    }

    // ------------------------------------------------------------------
    // ReadFile / WriteFile
    // ------------------------------------------------------------------

    /// Read up to `buf.len()` bytes at the current position
    ///
    /// Only an invalid handle or missing read rights fail. Fewer bytes than
    /// requested, end of file, or a stream that refuses the transfer all
    /// come back as a short count.
    pub fn try_read_file(&self, handle: Handle, buf: &mut [u8]) -> Result<usize> {
        let mut table = self.table.lock();
        let record = table.get_mut(handle)?;
        if !record.access().can_read() {
            return Err(FileApiError::AccessDenied);
        }
        Ok(read_full(record.stream_mut(), buf))
    }

    /// `ReadFile`
    ///
    /// The requested length is `buf.len()`. On success the transferred count
    /// is stored through `bytes_read` when supplied.
    pub fn read_file(&self, handle: Handle, buf: &mut [u8], bytes_read: Option<&mut u32>) -> bool {
        match self.record(self.try_read_file(handle, buf)) {
            Some(count) => {
                if let Some(out) = bytes_read {
                    *out = clamp_count(count);
                }
                true
            }
            None => false,
        }
    }

    /// Write `buf` at the current position
    ///
    /// Failure cases match [`FileApi::try_read_file`].
    pub fn try_write_file(&self, handle: Handle, buf: &[u8]) -> Result<usize> {
        let mut table = self.table.lock();
        let record = table.get_mut(handle)?;
        if !record.access().can_write() {
            return Err(FileApiError::AccessDenied);
        }
        Ok(write_full(record.stream_mut(), buf))
    }

    /// `WriteFile`
    pub fn write_file(&self, handle: Handle, buf: &[u8], bytes_written: Option<&mut u32>) -> bool {
        match self.record(self.try_write_file(handle, buf)) {
            Some(count) => {
                if let Some(out) = bytes_written {
                    *out = clamp_count(count);
                }
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // SetFilePointer
    // ------------------------------------------------------------------

    /// Move the file position by a full 64-bit distance
    ///
    /// Returns the new absolute position. A target before the start of the
    /// file fails with [`FileApiError::NegativeSeek`] and leaves the position
    /// where it was.
    pub fn try_set_file_pointer(&self, handle: Handle, distance: i64, method: MoveMethod) -> Result<u64> {
        let mut table = self.table.lock();
        let record = table.get_mut(handle)?;
        let target = method.seek_from(distance).ok_or(FileApiError::NegativeSeek)?;
        record.stream_mut().seek(target).map_err(|err| {
            debug!("seek {:?} failed: {}", target, err);
            FileApiError::NegativeSeek
        })
    }

    /// `SetFilePointer`
    ///
    /// With `distance_high` the distance is `distance_high:distance_low`;
    /// without it, `distance_low` sign-extended. On success the low 32 bits
    /// of the new position are returned and the high 32 bits are written back
    /// through `distance_high`. Returns [`INVALID_SET_FILE_POINTER`] on
    /// failure.
    pub fn set_file_pointer(
        &self,
        handle: Handle,
        distance_low: i32,
        distance_high: Option<&mut i32>,
        method: MoveMethod,
    ) -> u32 {
        let distance = match distance_high.as_deref() {
            Some(high) => join_distance(distance_low, *high),
            None => i64::from(distance_low),
        };

        match self.record(self.try_set_file_pointer(handle, distance, method)) {
            Some(position) => {
                if let Some(high) = distance_high {
                    *high = (position >> 32) as i32;
                }
                position as u32
            }
            None => INVALID_SET_FILE_POINTER,
        }
    }

    // ------------------------------------------------------------------
    // CloseHandle
    // ------------------------------------------------------------------

    /// Invalidate `handle` and release its stream
    pub fn try_close_handle(&self, handle: Handle) -> Result<()> {
        let mut table = self.table.lock();
        let (id, stream) = table.remove(handle)?.into_stream();

        // The handle is dead from here on, whatever the runtime reports
        if let Err(err) = self.primitive.lock().close(id, stream) {
            warn!("closing stream {} failed: {}", id, err);
        }
        debug!("close_handle {:#x} (stream {})", handle.raw(), id);
        Ok(())
    }

    /// `CloseHandle`
    pub fn close_handle(&self, handle: Handle) -> bool {
        self.record(self.try_close_handle(handle)).is_some()
    }
}

impl<P: StreamPrimitive + Default> Default for FileApi<P> {
    fn default() -> Self {
        Self::new(P::default())
    }
}

fn narrow_path(wide: &[u16]) -> Result<String> {
    let end = wide.iter().position(|&unit| unit == 0).unwrap_or(wide.len());
    String::from_utf16(&wide[..end]).map_err(|_| FileApiError::InvalidFileName)
}

fn clamp_count(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// `fread` semantics: keep reading until the buffer is full or the stream
/// stops delivering
///
/// A stream error ends the transfer with whatever count was reached, zero
/// included. The caller sees a short count, never a failure.
fn read_full<R: Read + ?Sized>(stream: &mut R, buf: &mut [u8]) -> usize {
    let mut total = 0;
    while total < buf.len() {
        match stream.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(count) => total += count,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                debug!("read stopped after {} bytes: {}", total, err);
                break;
            }
        }
    }
    total
}

/// `fwrite` counterpart of [`read_full`]
fn write_full<W: Write + ?Sized>(stream: &mut W, buf: &[u8]) -> usize {
    let mut total = 0;
    while total < buf.len() {
        match stream.write(&buf[total..]) {
            Ok(0) => break,
            Ok(count) => total += count,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                debug!("write stopped after {} bytes: {}", total, err);
                break;
            }
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    const READ: DesiredAccess = DesiredAccess::GENERIC_READ;
    const WRITE: DesiredAccess = DesiredAccess::GENERIC_WRITE;

    fn api() -> (FileApi<MemStreams>, MemStreams) {
        let fs = MemStreams::new();
        (FileApi::new(fs.clone()), fs)
    }

    #[test]
    fn test_join_distance() {
        assert_eq!(join_distance(5, 0), 5);
        assert_eq!(join_distance(0, 1), 1 << 32);
        assert_eq!(join_distance(-1, 0), 0xFFFF_FFFF);
        assert_eq!(join_distance(-1, -1), -1);
        assert_eq!(join_distance(-2, -1), -2);
    }

    #[test]
    fn test_invalid_disposition_does_not_probe() {
        let (api, fs) = api();
        for raw in [0, 5, 0xFFFF_FFFF] {
            let handle = api.create_file("new.txt", READ, 0, raw, 0);
            assert!(handle.is_invalid());
            assert_eq!(api.get_last_error(), ErrorCode::INVALID_PARAMETER);
        }
        assert!(!fs.exists("new.txt"));
        assert_eq!(api.open_handles(), 0);
    }

    #[test]
    fn test_success_leaves_last_error_untouched() {
        let (api, _fs) = api();
        api.set_last_error(ErrorCode(0x1234));
        let handle = api.create_file("fresh", READ | WRITE, 0, Disposition::CreateNew.raw(), 0);
        assert!(!handle.is_invalid());
        assert_eq!(api.get_last_error(), ErrorCode(0x1234));

        let mut written = 0;
        assert!(api.write_file(handle, b"abc", Some(&mut written)));
        assert_eq!(written, 3);
        assert!(api.close_handle(handle));
        assert_eq!(api.get_last_error(), ErrorCode(0x1234));
    }

    #[test]
    fn test_disposition_is_retained() {
        let (api, _fs) = api();
        let handle = api.create_file("d", WRITE, 0, Disposition::OpenAlways.raw(), 0);
        assert_eq!(api.disposition_of(handle).unwrap(), Disposition::OpenAlways);
        api.close_handle(handle);
        assert!(api.disposition_of(handle).is_err());
    }

    #[test]
    fn test_rights_checked_per_handle() {
        let (api, fs) = api();
        fs.insert("f", b"hello");

        let reader = api.create_file("f", READ, 0, Disposition::OpenExisting.raw(), 0);
        let mut buf = [0u8; 5];
        let mut count = 0;
        assert!(api.read_file(reader, &mut buf, Some(&mut count)));
        assert_eq!(&buf, b"hello");
        assert!(!api.write_file(reader, b"x", None));
        assert_eq!(api.get_last_error(), ErrorCode::ACCESS_DENIED);
        assert_eq!(fs.contents("f").unwrap(), b"hello");

        // The stream is opened rb+ here, but the handle only holds write rights
        let writer = api.create_file("f", WRITE, 0, Disposition::OpenExisting.raw(), 0);
        assert!(!api.read_file(writer, &mut buf, None));
        assert_eq!(api.get_last_error(), ErrorCode::ACCESS_DENIED);
        assert!(api.write_file(writer, b"J", None));
        assert_eq!(fs.contents("f").unwrap(), b"Jello");
    }

    #[test]
    fn test_failed_read_keeps_out_param() {
        let (api, _fs) = api();
        let mut count = 77;
        assert!(!api.read_file(Handle::from_raw(42), &mut [0u8; 4], Some(&mut count)));
        assert_eq!(count, 77);
        assert_eq!(api.get_last_error(), ErrorCode::INVALID_HANDLE);
    }

    #[test]
    fn test_capacity_exhaustion() {
        let fs = MemStreams::new();
        // Stream ids start at 3, so a table of 5 slots holds two handles
        let api = FileApi::with_config(fs.clone(), FileApiConfig::with_capacity(5));

        let a = api.create_file("a", WRITE, 0, Disposition::CreateAlways.raw(), 0);
        let b = api.create_file("b", WRITE, 0, Disposition::CreateAlways.raw(), 0);
        assert!(!a.is_invalid() && !b.is_invalid());

        let c = api.create_file("c", WRITE, 0, Disposition::CreateAlways.raw(), 0);
        assert!(c.is_invalid());
        assert_eq!(api.get_last_error(), ErrorCode::TOO_MANY_OPEN_FILES);
        assert_eq!(api.open_handles(), 2);
        assert_eq!(api.with_primitive(|p| p.open_count()), 2);

        // Closing frees the id and the slot
        assert!(api.close_handle(a));
        let c = api.create_file("c", WRITE, 0, Disposition::CreateAlways.raw(), 0);
        assert!(!c.is_invalid());
    }

    #[test]
    fn test_open_failure_keeps_informational_code() {
        let (api, fs) = api();
        fs.insert_locked("locked");

        // Probe says "exists, read-only"; OPEN_ALWAYS leaves ALREADY_EXISTS,
        // then the rb open itself fails
        let handle = api.create_file("locked", READ, 0, Disposition::OpenAlways.raw(), 0);
        assert!(handle.is_invalid());
        assert_eq!(api.get_last_error(), ErrorCode::ALREADY_EXISTS);

        // No informational code applies to OPEN_EXISTING: generic failure
        let handle = api.create_file("locked", READ, 0, Disposition::OpenExisting.raw(), 0);
        assert!(handle.is_invalid());
        assert_eq!(api.get_last_error(), ErrorCode::GEN_FAILURE);
    }

    #[test]
    fn test_create_file_w() {
        let (api, fs) = api();
        fs.insert("wide.txt", b"w");

        let name: Vec<u16> = "wide.txt\0garbage".encode_utf16().collect();
        let handle = api.create_file_w(&name, READ, 0, Disposition::OpenExisting.raw(), 0);
        assert!(!handle.is_invalid());
        assert!(api.close_handle(handle));

        // Unpaired surrogate cannot be narrowed
        let handle = api.create_file_w(&[0xD800], READ, 0, Disposition::OpenAlways.raw(), 0);
        assert!(handle.is_invalid());
        assert_eq!(api.get_last_error(), ErrorCode::INVALID_PARAMETER);
    }

    #[test]
    fn test_read_on_write_only_stream_is_short_count() {
        let (api, fs) = api();
        fs.insert("wb", b"stale");

        // CREATE_ALWAYS opens "wb" even when the handle holds read rights
        let handle = api.create_file("wb", READ | WRITE, 0, Disposition::CreateAlways.raw(), 0);
        assert!(!handle.is_invalid());
        assert!(api.write_file(handle, b"hello", None));
        assert_eq!(api.set_file_pointer(handle, 0, None, MoveMethod::Begin), 0);

        api.set_last_error(ErrorCode(0x55));
        let mut buf = [0u8; 5];
        let mut count = 77;
        assert!(api.read_file(handle, &mut buf, Some(&mut count)));
        assert_eq!(count, 0);
        assert_eq!(api.get_last_error(), ErrorCode(0x55));

        let all = api.create_file("all", DesiredAccess::GENERIC_ALL, 0, Disposition::CreateNew.raw(), 0);
        assert!(api.read_file(all, &mut buf, Some(&mut count)));
        assert_eq!(count, 0);
        assert_eq!(api.get_last_error(), ErrorCode(0x55));
    }

    /// Accepts `limit` bytes, then fails every write
    struct Brittle {
        limit: usize,
        taken: Vec<u8>,
    }

    impl Write for Brittle {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let room = self.limit - self.taken.len();
            if room == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "device full"));
            }
            let count = room.min(buf.len()).min(2);
            self.taken.extend_from_slice(&buf[..count]);
            Ok(count)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_full_stops_at_stream_error() {
        let mut partial = Brittle { limit: 3, taken: Vec::new() };
        assert_eq!(write_full(&mut partial, b"abcdef"), 3);
        assert_eq!(partial.taken, b"abc");

        let mut dead = Brittle { limit: 0, taken: Vec::new() };
        assert_eq!(write_full(&mut dead, b"abc"), 0);
    }

    #[test]
    fn test_write_beyond_addressable_end_moves_nothing() {
        let (api, fs) = api();
        let handle = api.create_file("edge", READ | WRITE, 0, Disposition::OpenAlways.raw(), 0);
        assert_eq!(
            api.try_set_file_pointer(handle, i64::MAX, MoveMethod::Begin).unwrap(),
            i64::MAX as u64
        );

        let mut written = 9;
        assert!(api.write_file(handle, b"x", Some(&mut written)));
        assert_eq!(written, 0);
        assert_eq!(fs.contents("edge").unwrap(), b"");
    }

    #[test]
    fn test_seek_out_param_round_trip() {
        let (api, _fs) = api();
        let handle = api.create_file("s", READ | WRITE, 0, Disposition::CreateAlways.raw(), 0);

        let mut high = 1;
        let low = api.set_file_pointer(handle, 16, Some(&mut high), MoveMethod::Begin);
        assert_eq!(low, 16);
        assert_eq!(high, 1);
        assert_eq!(
            api.try_set_file_pointer(handle, 0, MoveMethod::Current).unwrap(),
            (1u64 << 32) + 16
        );
    }
}
