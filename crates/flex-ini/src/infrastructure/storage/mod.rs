//! File access behind a trait.
//!
//! The store never touches `std::fs` directly.  It talks to a [`FileBackend`],
//! which has three jobs:
//!
//! - make sure the backing file exists before first use,
//! - read the whole file while tolerating other open handles,
//! - replace the whole file with new text.
//!
//! Every method returns an already-classified [`StoreError`], so callers can
//! tell a sharing violation from a real failure without inspecting OS codes.
//!
//! # Testability
//!
//! [`fs::FsBackend`] is the production implementation.  Tests use
//! [`memory::MemoryBackend`], which keeps files in a `HashMap` and can be told
//! to fail the next N reads or writes with a transient error.

use std::path::Path;

use crate::error::StoreError;

pub mod fs;
pub mod memory;

/// Whole-file access used by [`crate::application::store::IniStore`].
pub trait FileBackend: Send + Sync {
    /// Creates the parent directory and an empty file if either is missing.
    /// An existing file is left untouched.
    fn ensure_exists(&self, path: &Path) -> Result<(), StoreError>;

    /// Reads the full text of the file, allowing other handles to stay open
    /// for reading and writing.
    fn read_shared(&self, path: &Path) -> Result<String, StoreError>;

    /// Replaces the file contents with `text`, creating or truncating it.
    ///
    /// An empty `text` still truncates the file.
    fn write_exclusive(&self, path: &Path, text: &str) -> Result<(), StoreError>;
}
