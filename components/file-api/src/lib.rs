//! W4U File API - Win32 file handle emulation over stream primitives
//!
//! # Purpose
//! Lets code written against the Win32 file API (`CreateFile`, `ReadFile`,
//! `WriteFile`, `SetFilePointer`, `CloseHandle`, `GetLastError`,
//! `SetLastError`) run on a runtime that only offers C-library style streams
//! (open/read/write/seek/close), reproducing the host API's error-code matrix.
//!
//! # Integration Points
//! - Depends on: a [`StreamPrimitive`] (host `std::fs` or in-memory)
//! - Provides to: applications and compatibility shims
//! - Capabilities required: whatever the stream primitive needs to open paths
//!
//! # Architecture
//! - [`FileApi`] is the explicit process context: handle table, last-error
//!   cell and stream primitive, each behind its own guard
//! - Handle table is a fixed-capacity arena keyed by the stream id the
//!   primitive assigns on open
//! - Open/create outcome is decided by an ordered rule list over
//!   (disposition, existence, writability, requested access)
//!
//! # Testing Strategy
//! - Unit tests: rule ordering, handle validation, access checks
//! - Integration tests: exhaustive disposition matrix on [`MemStreams`],
//!   round-trip and seek behaviour on [`HostStreams`]

pub mod access;
pub mod api;
pub mod config;
pub mod disposition;
pub mod error;
pub mod handle;
pub mod host;
pub mod last_error;
pub mod memfs;
pub mod stream;

pub use access::{DesiredAccess, Disposition, MoveMethod};
pub use api::{join_distance, FileApi, Opened, INVALID_SET_FILE_POINTER};
pub use config::FileApiConfig;
pub use disposition::{Probe, Verdict};
pub use error::{ErrorCode, FileApiError, Result};
pub use handle::{Handle, HandleTable, INVALID_HANDLE_VALUE, SIGNATURE};
pub use host::HostStreams;
pub use last_error::LastError;
pub use memfs::MemStreams;
pub use stream::{OpenMode, Stream, StreamId, StreamPrimitive};
