//! Handle table
//!
//! A fixed-capacity arena of slots indexed by the stream id the primitive
//! returned on open. A slot is live while it carries [`SIGNATURE`]; close
//! clears the signature, and the slot storage stays behind for the next open
//! that is handed the same id.
//!
//! Handle values pack the slot index with a per-slot generation, so a value
//! kept across a close/reopen of the same slot no longer validates:
//!
//! ```text
//!  63            32 31             0
//! +----------------+----------------+
//! |   generation   |   slot index   |
//! +----------------+----------------+
//! ```

use static_assertions::const_assert_ne;

use crate::access::{DesiredAccess, Disposition};
use crate::error::{FileApiError, Result};
use crate::stream::StreamId;

/// Magic stamped into a live slot, "W324UEFI" in little-endian byte order
pub const SIGNATURE: u64 = 0x4946_4555_3432_3357;

const_assert_ne!(SIGNATURE, 0);

/// Failure sentinel returned by `create_file`, `(HANDLE)-1`
pub const INVALID_HANDLE_VALUE: Handle = Handle(u64::MAX);

/// Opaque file handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl Handle {
    fn new(slot: usize, generation: u32) -> Self {
        Handle((u64::from(generation) << 32) | slot as u64)
    }

    /// Rebuild a handle from a raw value received from a caller
    ///
    /// Any value is accepted here; validation happens on use.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Handle(raw)
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn is_invalid(self) -> bool {
        self == INVALID_HANDLE_VALUE
    }

    fn slot(self) -> usize {
        (self.0 & 0xFFFF_FFFF) as usize
    }

    fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }
}

/// State captured at open
#[derive(Debug)]
pub struct HandleRecord<S> {
    access: DesiredAccess,
    disposition: Disposition,
    stream_id: StreamId,
    stream: S,
}

impl<S> HandleRecord<S> {
    pub fn access(&self) -> DesiredAccess {
        self.access
    }

    pub fn disposition(&self) -> Disposition {
        self.disposition
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_stream(self) -> (StreamId, S) {
        (self.stream_id, self.stream)
    }
}

#[derive(Debug)]
struct Slot<S> {
    signature: u64,
    generation: u32,
    record: Option<HandleRecord<S>>,
}

impl<S> Slot<S> {
    const fn empty() -> Self {
        Self {
            signature: 0,
            generation: 0,
            record: None,
        }
    }

    fn is_live(&self) -> bool {
        self.signature == SIGNATURE
    }
}

/// Fixed-capacity handle arena
#[derive(Debug)]
pub struct HandleTable<S> {
    slots: Vec<Slot<S>>,
}

impl<S> HandleTable<S> {
    /// Create a table with `capacity` slots, all vacant
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, Slot::empty);
        Self { slots }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live handles
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_live()).count()
    }

    /// Check that `id` names a slot that can take a new record
    pub fn check_vacant(&self, id: StreamId) -> Result<()> {
        match self.slots.get(id) {
            None => Err(FileApiError::TooManyOpenFiles {
                capacity: self.capacity(),
            }),
            Some(slot) if slot.is_live() => Err(FileApiError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("stream id {} is still bound to a live handle", id),
            ))),
            Some(_) => Ok(()),
        }
    }

    /// Stamp slot `id` live and return its handle
    pub fn insert(
        &mut self,
        id: StreamId,
        stream: S,
        access: DesiredAccess,
        disposition: Disposition,
    ) -> Result<Handle> {
        self.check_vacant(id)?;
        let slot = &mut self.slots[id];

        // Generation 0 is never issued, so a zeroed value never validates
        slot.generation = match slot.generation.wrapping_add(1) {
            0 => 1,
            next => next,
        };
        slot.record = Some(HandleRecord {
            access,
            disposition,
            stream_id: id,
            stream,
        });
        slot.signature = SIGNATURE;

        Ok(Handle::new(id, slot.generation))
    }

    /// Resolve a handle to its live record
    pub fn get_mut(&mut self, handle: Handle) -> Result<&mut HandleRecord<S>> {
        let invalid = FileApiError::InvalidHandle { raw: handle.raw() };
        match self.slots.get_mut(handle.slot()) {
            Some(slot) if slot.is_live() && slot.generation == handle.generation() => {
                slot.record.as_mut().ok_or(invalid)
            }
            _ => Err(invalid),
        }
    }

    /// Resolve a handle without mutable access
    pub fn get(&self, handle: Handle) -> Result<&HandleRecord<S>> {
        let invalid = FileApiError::InvalidHandle { raw: handle.raw() };
        match self.slots.get(handle.slot()) {
            Some(slot) if slot.is_live() && slot.generation == handle.generation() => {
                slot.record.as_ref().ok_or(invalid)
            }
            _ => Err(invalid),
        }
    }

    /// Invalidate a handle and hand back its record
    ///
    /// The signature is cleared before the record leaves the table.
    pub fn remove(&mut self, handle: Handle) -> Result<HandleRecord<S>> {
        self.get(handle)?;
        let slot = &mut self.slots[handle.slot()];
        slot.signature = 0;
        slot.record.take().ok_or(FileApiError::InvalidHandle { raw: handle.raw() })
    }
}
