//! Open-mode flags and connection options

use rusqlite::OpenFlags;
use std::ops::{BitOr, BitOrAssign};
use std::time::Duration;

/// Bitwise-composable open mode, numerically identical to SQLite's
/// `SQLITE_OPEN_*` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpenMode(i32);

pub const OPEN_READONLY: OpenMode = OpenMode(0x0000_0001);
pub const OPEN_READWRITE: OpenMode = OpenMode(0x0000_0002);
pub const OPEN_CREATE: OpenMode = OpenMode(0x0000_0004);

impl OpenMode {
    pub const fn bits(self) -> i32 {
        self.0
    }

    /// Accept raw flags from a caller; bits outside the three modes are dropped.
    pub const fn from_bits_truncate(bits: i32) -> Self {
        OpenMode(bits & (OPEN_READONLY.0 | OPEN_READWRITE.0 | OPEN_CREATE.0))
    }

    pub const fn contains(self, other: OpenMode) -> bool {
        self.0 & other.0 == other.0
    }

    pub(crate) fn to_flags(self) -> OpenFlags {
        OpenFlags::from_bits_truncate(self.0)
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
    }
}

impl Default for OpenMode {
    fn default() -> Self {
        OPEN_READWRITE | OPEN_CREATE
    }
}

impl BitOr for OpenMode {
    type Output = OpenMode;

    fn bitor(self, rhs: OpenMode) -> OpenMode {
        OpenMode(self.0 | rhs.0)
    }
}

impl BitOrAssign for OpenMode {
    fn bitor_assign(&mut self, rhs: OpenMode) {
        self.0 |= rhs.0;
    }
}

/// Settings applied once, right after the native open succeeds.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    pub mode: OpenMode,
    pub busy_timeout: Option<Duration>,
    pub foreign_keys: bool,
    pub extended_result_codes: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions {
            mode: OpenMode::default(),
            busy_timeout: None,
            foreign_keys: false,
            extended_result_codes: true,
        }
    }
}

impl OpenOptions {
    pub fn new(mode: OpenMode) -> Self {
        OpenOptions {
            mode,
            ..Default::default()
        }
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = Some(timeout);
        self
    }

    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    pub fn extended_result_codes(mut self, enabled: bool) -> Self {
        self.extended_result_codes = enabled;
        self
    }
}
