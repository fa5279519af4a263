//! Real file system backend.
//!
//! # Sharing modes on Windows
//!
//! Windows lets every `open` call declare which *other* handles may coexist
//! with it.  Reads here allow concurrent readers and writers, so loading a
//! file that another program keeps open still works.  Writes allow nobody
//! else, which is what makes a competing writer see
//! `ERROR_SHARING_VIOLATION`; the retry policy waits that out.
//!
//! On Unix there is no mandatory locking and these flags do not exist.

use std::fs::{self, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

use tracing::debug;
#[cfg(windows)]
use windows::Win32::Storage::FileSystem::{FILE_SHARE_READ, FILE_SHARE_WRITE};

use super::FileBackend;
use crate::error::StoreError;

const UTF8_BOM: char = '\u{feff}';

/// [`FileBackend`] over `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsBackend;

impl FileBackend for FsBackend {
    fn ensure_exists(&self, path: &Path) -> Result<(), StoreError> {
        // An existing file is only ever read here, so read-only files and
        // read-only mounts still load.
        if path.is_file() {
            return Ok(());
        }

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| StoreError::from_io(dir, source))?;
        }

        // Losing a creation race to another thread or process is fine.
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(_) => {
                debug!(path = %path.display(), "created empty ini file");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(source) => Err(StoreError::from_io(path, source)),
        }
    }

    fn read_shared(&self, path: &Path) -> Result<String, StoreError> {
        let mut options = OpenOptions::new();
        options.read(true);
        #[cfg(windows)]
        {
            use std::os::windows::fs::OpenOptionsExt;
            options.share_mode((FILE_SHARE_READ | FILE_SHARE_WRITE).0);
        }

        let mut file = options
            .open(path)
            .map_err(|source| StoreError::from_io(path, source))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|source| StoreError::from_io(path, source))?;

        // Invalid UTF-8 degrades to replacement characters rather than failing
        // the load; a leading byte-order mark is dropped.
        let text = String::from_utf8_lossy(&bytes);
        let text = text.strip_prefix(UTF8_BOM).unwrap_or(&text).to_string();
        debug!(path = %path.display(), bytes = bytes.len(), "read ini file");
        Ok(text)
    }

    fn write_exclusive(&self, path: &Path, text: &str) -> Result<(), StoreError> {
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(windows)]
        {
            use std::os::windows::fs::OpenOptionsExt;
            options.share_mode(0);
        }

        let mut file = options
            .open(path)
            .map_err(|source| StoreError::from_io(path, source))?;
        file.write_all(text.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|source| StoreError::from_io(path, source))?;
        debug!(path = %path.display(), bytes = text.len(), "wrote ini file");
        Ok(())
    }
}
