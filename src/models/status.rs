use bitflags::bitflags;
use std::fmt;

/// Raw per-file status bits reported by `SccQueryInfo`.
pub mod raw {
    pub const INVALID: i32 = -1;
    pub const NOTCONTROLLED: i32 = 0x0000;
    pub const CONTROLLED: i32 = 0x0001;
    pub const CHECKEDOUT: i32 = 0x0002;
    pub const OUTOTHER: i32 = 0x0004;
    pub const OUTEXCLUSIVE: i32 = 0x0008;
    pub const OUTMULTIPLE: i32 = 0x0010;
    pub const OUTOFDATE: i32 = 0x0020;
    pub const DELETED: i32 = 0x0040;
    pub const LOCKED: i32 = 0x0080;
    pub const MERGED: i32 = 0x0100;
    pub const SHARED: i32 = 0x0200;
    pub const PINNED: i32 = 0x0400;
    pub const MODIFIED: i32 = 0x0800;
    pub const OUTBYUSER: i32 = 0x1000;
    pub const NOMERGE: i32 = 0x2000;
}

/// Source control state of a single file as the debugger front end sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// The status query failed or no provider is bound.
    Error,
    /// Not under source control (or deleted from it).
    None,
    CheckedOut,
    CheckedOutByUser,
    CheckedIn,
}

impl Status {
    /// Map a raw status bitmask onto [`Status`].
    ///
    /// First match wins: `DELETED` or zero, then `OUTBYUSER`, then `CHECKEDOUT`.
    pub fn from_raw(bits: i32) -> Self {
        if bits & raw::DELETED != 0 || bits == 0 {
            Status::None
        } else if bits & raw::OUTBYUSER != 0 {
            Status::CheckedOutByUser
        } else if bits & raw::CHECKEDOUT != 0 {
            Status::CheckedOut
        } else {
            Status::CheckedIn
        }
    }

    pub fn is_checked_out(self) -> bool {
        matches!(self, Status::CheckedOut | Status::CheckedOutByUser)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Status::Error => "error",
            Status::None => "not controlled",
            Status::CheckedOut => "checked out",
            Status::CheckedOutByUser => "checked out by user",
            Status::CheckedIn => "checked in",
        };
        f.pad(text)
    }
}

/// Signed result code returned by every SCC entry point.
///
/// Negative values are errors, zero is success and positive values are
/// informational warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SccCode(pub i32);

impl SccCode {
    pub const OK: SccCode = SccCode(0);
    pub const INITIALIZE_FAILED: SccCode = SccCode(-1);
    pub const UNKNOWN_PROJECT: SccCode = SccCode(-2);
    pub const NOT_CHECKED_OUT: SccCode = SccCode(-4);
    pub const ALREADY_CHECKED_OUT: SccCode = SccCode(-5);
    pub const FILE_IS_LOCKED: SccCode = SccCode(-6);
    pub const ACCESS_FAILURE: SccCode = SccCode(-8);
    pub const OP_NOT_SUPPORTED: SccCode = SccCode(-14);
    pub const NONSPECIFIC_ERROR: SccCode = SccCode(-15);
    pub const PROJECT_ALREADY_OPEN: SccCode = SccCode(-22);
    pub const INVALID_FILE_PATH: SccCode = SccCode(-24);
    pub const PROJECT_NOT_OPEN: SccCode = SccCode(-25);
    pub const UNKNOWN_ERROR: SccCode = SccCode(-30);

    pub fn is_ok(self) -> bool {
        self.0 >= 0
    }

    pub fn is_error(self) -> bool {
        self.0 < 0
    }

    pub fn is_warning(self) -> bool {
        self.0 > 0
    }

    /// Human readable description of the code.
    pub fn describe(self) -> &'static str {
        match self.0 {
            0 => "success",
            -1 => "initialization failed",
            -2 => "unknown project",
            -3 => "could not create project",
            -4 => "file is not checked out",
            -5 => "file is already checked out",
            -6 => "file is locked",
            -7 => "file is checked out exclusively",
            -8 => "access failure",
            -9 => "check in conflict",
            -10 => "file already exists",
            -11 => "file is not under source control",
            -12 => "file is checked out",
            -13 => "no specified version",
            -14 => "operation not supported",
            -15 => "nonspecific error",
            -16 => "operation not performed",
            -17 => "type not supported",
            -18 => "verify merge",
            -19 => "fix merge",
            -20 => "shell failure",
            -21 => "invalid user",
            -22 => "project already open",
            -23 => "project syntax error",
            -24 => "invalid file path",
            -25 => "project not open",
            -26 => "not authorized",
            -27 => "file syntax error",
            -28 => "file does not exist",
            -29 => "connection failure",
            -30 => "unknown error",
            -31 => "background get in progress",
            n if n > 0 => "completed with warnings",
            _ => "unrecognized error",
        }
    }
}

impl Default for SccCode {
    fn default() -> Self {
        SccCode::OK
    }
}

impl fmt::Display for SccCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.describe(), self.0)
    }
}

bitflags! {
    /// Capability mask reported by `SccInitialize`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SccCaps: u32 {
        const REMOVE = 0x0000_0001;
        const RENAME = 0x0000_0002;
        const DIFF = 0x0000_0004;
        const HISTORY = 0x0000_0008;
        const PROPERTIES = 0x0000_0010;
        const RUNSCC = 0x0000_0020;
        const GETCOMMANDOPTIONS = 0x0000_0040;
        const QUERYINFO = 0x0000_0080;
        const GETEVENTS = 0x0000_0100;
        const GETPROJPATH = 0x0000_0200;
        const ADDMOVEFROMSCC = 0x0000_0400;
        const COMMENTCHECKOUT = 0x0000_0800;
        const COMMENTCHECKIN = 0x0000_1000;
        const COMMENTADD = 0x0000_2000;
        const COMMENTREMOVE = 0x0000_4000;
        const TEXTOUT = 0x0000_8000;
        const CREATESUBPROJECT = 0x0001_0000;
        const GETPARENTPROJECT = 0x0002_0000;
        const BATCH = 0x0004_0000;
        const DIRECTORYSTATUS = 0x0008_0000;
        const DIRECTORYDIFF = 0x0010_0000;
        const ADD_STORELATEST = 0x0020_0000;
        const HISTORY_MULTFILE = 0x0040_0000;
        const IGNORECASE = 0x0080_0000;
        const IGNORESPACE = 0x0100_0000;
        const POPULATELIST = 0x0200_0000;
        const COMMENTPROJECT = 0x0400_0000;
        const MULTICHECKOUT = 0x0800_0000;
        const DIFFALWAYS = 0x1000_0000;
        const GET_NOUI = 0x2000_0000;
        const REENTRANT = 0x4000_0000;
        const SCCFILE = 0x8000_0000;
    }
}

impl SccCaps {
    /// Interpret the signed mask written by the plugin.
    pub fn from_raw(mask: i32) -> Self {
        SccCaps::from_bits_retain(mask as u32)
    }
}
