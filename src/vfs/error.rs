use crate::block::block_error::BlockError;
use alloc::format;
use alloc::string::String;

/// The error taxonomy every VFS operation draws from.
///
/// Callers across the public API observe exactly one of these kinds;
/// filesystem drivers translate their internal error types into it at the
/// operation-table boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed argument (bad flags, bad whence, negative position, …)
    InvalidParameter,
    /// Path component or directory entry not found
    NotFound,
    /// Operation not permitted on this object
    Permission,
    /// Target already exists
    Exists,
    /// Operation expecting a directory was given something else
    NotDirectory,
    /// Operation expecting a file was given a directory
    IsDirectory,
    /// No space left on the volume
    NoSpace,
    /// Write operation on a read-only filesystem or file
    ReadOnly,
    /// Name exceeds the component length bound
    NameTooLong,
    /// Out of memory (also: descriptor table exhausted)
    NoMemory,
    /// Error accessing underlying storage
    Io(String),
    /// Operation not supported by this filesystem
    Unsupported,
    /// Object is in use (live superblocks, open files, mounted dentry, …)
    Busy,
    /// Operation would span two filesystems
    CrossDevice,
}

impl From<BlockError> for Error {
    fn from(value: BlockError) -> Self {
        Self::Io(format!("{value}"))
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidParameter => write!(f, "invalid parameter"),
            Self::NotFound => write!(f, "not found"),
            Self::Permission => write!(f, "permission denied"),
            Self::Exists => write!(f, "already exists"),
            Self::NotDirectory => write!(f, "not a directory"),
            Self::IsDirectory => write!(f, "is a directory"),
            Self::NoSpace => write!(f, "no space left on device"),
            Self::ReadOnly => write!(f, "read-only file system"),
            Self::NameTooLong => write!(f, "name too long"),
            Self::NoMemory => write!(f, "out of memory"),
            Self::Io(s) => write!(f, "I/O error: {s}"),
            Self::Unsupported => write!(f, "unsupported operation"),
            Self::Busy => write!(f, "device or resource busy"),
            Self::CrossDevice => write!(f, "cross-device operation"),
        }
    }
}

impl core::error::Error for Error {}

impl Error {
    /// The negative integer surface of the taxonomy, for callers that speak
    /// error codes rather than sum types.
    pub fn to_errno(&self) -> i32 {
        match self {
            Error::InvalidParameter => -1,
            Error::NotFound => -2,
            Error::Permission => -3,
            Error::Exists => -4,
            Error::NotDirectory => -5,
            Error::IsDirectory => -6,
            Error::NoSpace => -7,
            Error::ReadOnly => -8,
            Error::NameTooLong => -9,
            Error::NoMemory => -10,
            Error::Io(_) => -11,
            Error::Unsupported => -12,
            Error::Busy => -13,
            Error::CrossDevice => -14,
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn errno_surface_is_negative_and_distinct() {
        let all = [
            Error::InvalidParameter,
            Error::NotFound,
            Error::Permission,
            Error::Exists,
            Error::NotDirectory,
            Error::IsDirectory,
            Error::NoSpace,
            Error::ReadOnly,
            Error::NameTooLong,
            Error::NoMemory,
            Error::Io(String::from("x")),
            Error::Unsupported,
            Error::Busy,
            Error::CrossDevice,
        ];
        let mut seen = std::collections::BTreeSet::new();
        for e in &all {
            assert!(e.to_errno() < 0);
            assert!(seen.insert(e.to_errno()), "duplicate code for {e}");
        }
    }

    #[test]
    fn block_errors_collapse_to_io() {
        let e = Error::from(crate::block::BlockError::ReadError);
        assert!(matches!(e, Error::Io(_)));
    }
}
