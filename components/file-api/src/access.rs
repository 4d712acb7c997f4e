//! Access rights, creation dispositions and seek origins
//!
//! Numeric values are the Win32 ones so raw arguments from foreign callers
//! can be converted without a lookup table.

use bitflags::bitflags;

use crate::error::FileApiError;

bitflags! {
    /// `dwDesiredAccess` generic rights
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DesiredAccess: u32 {
        const GENERIC_READ = 0x8000_0000;
        const GENERIC_WRITE = 0x4000_0000;
        const GENERIC_EXECUTE = 0x2000_0000;
        const GENERIC_ALL = 0x1000_0000;
    }
}

impl DesiredAccess {
    /// Rights that permit `ReadFile`
    #[inline]
    pub fn can_read(self) -> bool {
        self.intersects(Self::GENERIC_READ | Self::GENERIC_ALL)
    }

    /// Rights that permit `WriteFile`
    #[inline]
    pub fn can_write(self) -> bool {
        self.intersects(Self::GENERIC_WRITE | Self::GENERIC_ALL)
    }
}

/// `dwCreationDisposition`
///
/// Ordinals matter: dispositions below [`Disposition::OpenExisting`] open
/// the underlying stream truncating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum Disposition {
    CreateNew = 1,
    CreateAlways = 2,
    OpenExisting = 3,
    OpenAlways = 4,
}

impl Disposition {
    pub const ALL: [Disposition; 4] = [
        Disposition::CreateNew,
        Disposition::CreateAlways,
        Disposition::OpenExisting,
        Disposition::OpenAlways,
    ];

    #[inline]
    pub const fn raw(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for Disposition {
    type Error = FileApiError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        match raw {
            1 => Ok(Disposition::CreateNew),
            2 => Ok(Disposition::CreateAlways),
            3 => Ok(Disposition::OpenExisting),
            4 => Ok(Disposition::OpenAlways),
            _ => Err(FileApiError::InvalidDisposition { raw }),
        }
    }
}

/// `dwMoveMethod`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MoveMethod {
    Begin = 0,
    Current = 1,
    End = 2,
}

impl MoveMethod {
    /// Build the `std::io::SeekFrom` for a signed distance
    ///
    /// Returns `None` when the distance is negative relative to the start,
    /// which no stream can honour.
    pub fn seek_from(self, distance: i64) -> Option<std::io::SeekFrom> {
        match self {
            MoveMethod::Begin => u64::try_from(distance).ok().map(std::io::SeekFrom::Start),
            MoveMethod::Current => Some(std::io::SeekFrom::Current(distance)),
            MoveMethod::End => Some(std::io::SeekFrom::End(distance)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_directions() {
        assert!(DesiredAccess::GENERIC_READ.can_read());
        assert!(!DesiredAccess::GENERIC_READ.can_write());
        assert!(DesiredAccess::GENERIC_WRITE.can_write());
        assert!(!DesiredAccess::GENERIC_WRITE.can_read());
        assert!(DesiredAccess::GENERIC_ALL.can_read());
        assert!(DesiredAccess::GENERIC_ALL.can_write());
        assert!(!DesiredAccess::GENERIC_EXECUTE.can_read());
        assert!(!DesiredAccess::empty().can_write());
    }

    #[test]
    fn test_disposition_raw_values() {
        for disposition in Disposition::ALL {
            assert_eq!(Disposition::try_from(disposition.raw()).unwrap(), disposition);
        }
        assert!(matches!(
            Disposition::try_from(0),
            Err(FileApiError::InvalidDisposition { raw: 0 })
        ));
        // TRUNCATE_EXISTING is not supported by this layer
        assert!(Disposition::try_from(5).is_err());
        assert!(Disposition::CreateAlways < Disposition::OpenExisting);
    }

    #[test]
    fn test_seek_from() {
        use std::io::SeekFrom;

        assert_eq!(MoveMethod::Begin.seek_from(10), Some(SeekFrom::Start(10)));
        assert_eq!(MoveMethod::Begin.seek_from(-1), None);
        assert_eq!(MoveMethod::Current.seek_from(-4), Some(SeekFrom::Current(-4)));
        assert_eq!(MoveMethod::End.seek_from(0), Some(SeekFrom::End(0)));
    }
}
