//! Open/create decision procedure
//!
//! `CreateFile` outcomes depend on (disposition, does the file exist, is it
//! writable, which rights were asked for). The C runtime only tells us
//! "opened" or "failed with errno", so the layer probes first and then walks
//! an ordered rule list:
//!
//! ```text
//! #  when                                                        outcome
//! 1  absent && OPEN_EXISTING                                     fail FILE_NOT_FOUND
//! 2  exists && CREATE_NEW                                        fail FILE_EXISTS
//! 3  exists && (CREATE_NEW || (read-only && GENERIC_WRITE)
//!              || (GENERIC_ALL && CREATE_ALWAYS|OPEN_*))         fail ACCESS_DENIED
//! 4  exists && ((writable && OPEN_ALWAYS|CREATE_ALWAYS)
//!              || (read-only && OPEN_ALWAYS))                    note ALREADY_EXISTS
//! 5  exists && read-only && CREATE_ALWAYS                        note ACCESS_DENIED
//! ```
//!
//! The first failing rule wins. Notes do not stop the walk; the last note
//! that applies is what the caller sees after a successful open.

use std::io;

use crate::access::{DesiredAccess, Disposition};
use crate::error::{ErrorCode, FileApiError};
use crate::stream::{OpenMode, StreamPrimitive};

/// Existence and writability of a path, observed without modifying it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    pub exists: bool,
    pub writable: bool,
}

impl Probe {
    pub const ABSENT: Probe = Probe {
        exists: false,
        writable: true,
    };

    /// Probe by opening `"rb+"`, which neither creates nor truncates
    ///
    /// Not-found means absent. Any other failure means the path exists but
    /// cannot be written.
    pub fn run<P: StreamPrimitive>(primitive: &mut P, path: &str) -> Probe {
        let probe = match primitive.open(path, OpenMode::ReadWrite) {
            Ok((id, stream)) => {
                if let Err(err) = primitive.close(id, stream) {
                    log::debug!("probe close of {:?} failed: {}", path, err);
                }
                Probe {
                    exists: true,
                    writable: true,
                }
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Probe::ABSENT,
            Err(err) => {
                log::trace!("probe of {:?} failed: {}", path, err);
                Probe {
                    exists: true,
                    writable: false,
                }
            }
        };
        log::trace!("probe {:?}: {:?}", path, probe);
        probe
    }
}

/// Everything the rule list looks at
#[derive(Debug, Clone, Copy)]
pub struct Request {
    pub disposition: Disposition,
    pub access: DesiredAccess,
    pub probe: Probe,
}

impl Request {
    fn exists(&self) -> bool {
        self.probe.exists
    }

    fn read_only(&self) -> bool {
        !self.probe.writable
    }

    fn is(&self, disposition: Disposition) -> bool {
        self.disposition == disposition
    }
}

/// Hard refusal of an open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    FileNotFound,
    FileExists,
    AccessDenied,
}

impl Refusal {
    pub fn code(self) -> ErrorCode {
        match self {
            Refusal::FileNotFound => ErrorCode::FILE_NOT_FOUND,
            Refusal::FileExists => ErrorCode::FILE_EXISTS,
            Refusal::AccessDenied => ErrorCode::ACCESS_DENIED,
        }
    }

    pub fn into_error(self, path: &str) -> FileApiError {
        match self {
            Refusal::FileNotFound => FileApiError::FileNotFound {
                path: path.to_string(),
            },
            Refusal::FileExists => FileApiError::FileExists {
                path: path.to_string(),
            },
            Refusal::AccessDenied => FileApiError::AccessDenied,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Fail(Refusal),
    Note(ErrorCode),
}

struct Rule {
    name: &'static str,
    applies: fn(&Request) -> bool,
    outcome: Outcome,
}

/// Evaluated top to bottom; order is significant
static RULES: [Rule; 5] = [
    Rule {
        name: "absent-open-existing",
        applies: |r| !r.exists() && r.is(Disposition::OpenExisting),
        outcome: Outcome::Fail(Refusal::FileNotFound),
    },
    Rule {
        name: "exists-create-new",
        applies: |r| r.exists() && r.is(Disposition::CreateNew),
        outcome: Outcome::Fail(Refusal::FileExists),
    },
    Rule {
        name: "exists-access-denied",
        applies: |r| {
            r.exists()
                && (r.is(Disposition::CreateNew)
                    || (r.read_only() && r.access.contains(DesiredAccess::GENERIC_WRITE))
                    || (r.access.contains(DesiredAccess::GENERIC_ALL)
                        && matches!(
                            r.disposition,
                            Disposition::CreateAlways
                                | Disposition::OpenAlways
                                | Disposition::OpenExisting
                        )))
        },
        outcome: Outcome::Fail(Refusal::AccessDenied),
    },
    Rule {
        name: "exists-already-exists",
        applies: |r| {
            r.exists()
                && ((!r.read_only()
                    && (r.is(Disposition::OpenAlways) || r.is(Disposition::CreateAlways)))
                    || (r.read_only() && r.is(Disposition::OpenAlways)))
        },
        outcome: Outcome::Note(ErrorCode::ALREADY_EXISTS),
    },
    Rule {
        name: "read-only-create-always",
        applies: |r| r.exists() && r.read_only() && r.is(Disposition::CreateAlways),
        outcome: Outcome::Note(ErrorCode::ACCESS_DENIED),
    },
];

/// Result of walking the rule list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Open must not happen
    Refuse(Refusal),
    /// Open the stream in `mode`; `note` is left in the last-error cell
    Proceed {
        mode: OpenMode,
        note: Option<ErrorCode>,
    },
}

impl Verdict {
    pub fn decide(request: &Request) -> Verdict {
        let mut note = None;
        for rule in RULES.iter() {
            if !(rule.applies)(request) {
                continue;
            }
            log::trace!("open rule {} matched", rule.name);
            match rule.outcome {
                Outcome::Fail(refusal) => return Verdict::Refuse(refusal),
                Outcome::Note(code) => note = Some(code),
            }
        }
        Verdict::Proceed {
            mode: open_mode(request.disposition, request.probe),
            note,
        }
    }
}

/// Stream mode for an open that passed the rule list
///
/// `CREATE_*` truncate through `"wb"`. `OPEN_*` use `"rb+"` on an existing
/// writable file and `"wb+"` to create an absent one. A read-only target is
/// only ever opened `"rb"`, whatever the disposition, so `CREATE_ALWAYS` on a
/// read-only file succeeds without truncating it.
pub fn open_mode(disposition: Disposition, probe: Probe) -> OpenMode {
    if !probe.writable {
        OpenMode::Read
    } else if disposition < Disposition::OpenExisting {
        OpenMode::WriteTruncate
    } else if probe.exists {
        OpenMode::ReadWrite
    } else {
        OpenMode::ReadWriteTruncate
    }
}
