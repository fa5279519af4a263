//! Error type shared by every layer of the store.
//!
//! Errors are *classified* at the point where they leave the operating
//! system, so the retry policy can decide what to do by looking at the enum
//! variant instead of digging through raw OS codes.
//!
//! | Variant             | Meaning                                   | Retried? |
//! |---------------------|-------------------------------------------|----------|
//! | `Transient`         | file briefly held by someone else         | yes      |
//! | `Io`                | any other I/O failure                     | no       |
//! | `RetriesExhausted`  | a transient failure outlasted the budget  | no       |
//!
//! Malformed file content is never an error; see [`crate::domain::document`].

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// The two short-lived conditions worth retrying.
///
/// Both are Windows-specific.  On other platforms advisory locking means a
/// concurrent writer never makes `open` fail, so nothing maps to these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransientIo {
    /// `ERROR_SHARING_VIOLATION`: another process has the file open in an
    /// incompatible sharing mode.
    SharingViolation,
    /// `ERROR_USER_MAPPED_FILE`: the file has a user-mapped section open
    /// (typically an antivirus scanner or indexer).
    UserMappedSection,
}

impl TransientIo {
    /// Maps a Win32 error code to its transient kind, if it is one.
    #[cfg(windows)]
    pub fn from_windows_code(code: u32) -> Option<Self> {
        use windows::Win32::Foundation::{ERROR_SHARING_VIOLATION, ERROR_USER_MAPPED_FILE};

        if code == ERROR_SHARING_VIOLATION.0 {
            Some(Self::SharingViolation)
        } else if code == ERROR_USER_MAPPED_FILE.0 {
            Some(Self::UserMappedSection)
        } else {
            None
        }
    }

    /// Classifies an I/O error raised by the host operating system.
    pub fn from_io_error(err: &io::Error) -> Option<Self> {
        #[cfg(windows)]
        {
            err.raw_os_error()
                .and_then(|code| u32::try_from(code).ok())
                .and_then(Self::from_windows_code)
        }

        #[cfg(not(windows))]
        {
            let _ = err;
            None
        }
    }
}

impl fmt::Display for TransientIo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SharingViolation => f.write_str("file is in use by another process"),
            Self::UserMappedSection => f.write_str("file has a user-mapped section open"),
        }
    }
}

/// Error type for every store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The file is temporarily unavailable; trying again shortly may succeed.
    #[error("{kind}: {path}")]
    Transient { kind: TransientIo, path: PathBuf },

    /// A file system I/O error that retrying will not fix.
    #[error("I/O error accessing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A transient failure persisted through every attempt.
    #[error("{operation} gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
        #[source]
        last: Box<StoreError>,
    },
}

impl StoreError {
    /// Wraps an I/O error for `path`, classifying it as transient or fatal.
    pub fn from_io(path: &Path, source: io::Error) -> Self {
        match TransientIo::from_io_error(&source) {
            Some(kind) => Self::Transient {
                kind,
                path: path.to_path_buf(),
            },
            None => Self::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    /// `true` for errors the retry policy should try again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}
