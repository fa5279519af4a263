//! In-memory file backend for unit testing.
//!
//! Allows tests to run the store without touching the disk and to inject
//! transient failures ("file in use") into the next N reads or writes.
//!
//! Files are keyed by their absolute path, so `settings.ini` and
//! `./settings.ini` name the same entry.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::FileBackend;
use crate::application::registry::absolute_path;
use crate::error::{StoreError, TransientIo};

/// A scripted failure waiting to be returned by the next matching call.
#[derive(Debug)]
enum Failure {
    Transient(TransientIo),
    Fatal(io::ErrorKind),
}

impl Failure {
    fn into_error(self, path: &Path) -> StoreError {
        match self {
            Self::Transient(kind) => StoreError::Transient {
                kind,
                path: path.to_path_buf(),
            },
            Self::Fatal(kind) => StoreError::Io {
                path: path.to_path_buf(),
                source: io::Error::new(kind, "injected failure"),
            },
        }
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    files: HashMap<PathBuf, String>,
    read_failures: VecDeque<Failure>,
    write_failures: VecDeque<Failure>,
    reads: usize,
    writes: usize,
}

/// A [`FileBackend`] that keeps every file in a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    /// Creates a backend with no files.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-populated with one file.
    pub fn with_file(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        let backend = Self::new();
        backend
            .state
            .lock()
            .expect("lock poisoned")
            .files
            .insert(absolute_path(&path.into()), text.into());
        backend
    }

    /// Makes the next `count` reads fail with `kind`.
    pub fn fail_next_reads(&self, count: usize, kind: TransientIo) {
        let mut state = self.state.lock().expect("lock poisoned");
        state
            .read_failures
            .extend((0..count).map(|_| Failure::Transient(kind)));
    }

    /// Makes the next `count` writes fail with `kind`.
    pub fn fail_next_writes(&self, count: usize, kind: TransientIo) {
        let mut state = self.state.lock().expect("lock poisoned");
        state
            .write_failures
            .extend((0..count).map(|_| Failure::Transient(kind)));
    }

    /// Makes the next write fail with a non-retryable I/O error.
    pub fn fail_next_write_fatally(&self, kind: io::ErrorKind) {
        self.state
            .lock()
            .expect("lock poisoned")
            .write_failures
            .push_back(Failure::Fatal(kind));
    }

    /// Current contents of `path`, if the file exists.
    pub fn contents(&self, path: &Path) -> Option<String> {
        self.state
            .lock()
            .expect("lock poisoned")
            .files
            .get(&absolute_path(path))
            .cloned()
    }

    /// Number of `read_shared` calls, failed ones included.
    pub fn read_count(&self) -> usize {
        self.state.lock().expect("lock poisoned").reads
    }

    /// Number of `write_exclusive` calls, failed ones included.
    pub fn write_count(&self) -> usize {
        self.state.lock().expect("lock poisoned").writes
    }
}

impl FileBackend for MemoryBackend {
    fn ensure_exists(&self, path: &Path) -> Result<(), StoreError> {
        self.state
            .lock()
            .expect("lock poisoned")
            .files
            .entry(absolute_path(path))
            .or_default();
        Ok(())
    }

    fn read_shared(&self, path: &Path) -> Result<String, StoreError> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.reads += 1;
        if let Some(failure) = state.read_failures.pop_front() {
            return Err(failure.into_error(path));
        }
        state.files.get(&absolute_path(path)).cloned().ok_or_else(|| StoreError::Io {
            path: path.to_path_buf(),
            source: io::Error::from(io::ErrorKind::NotFound),
        })
    }

    fn write_exclusive(&self, path: &Path, text: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.writes += 1;
        if let Some(failure) = state.write_failures.pop_front() {
            return Err(failure.into_error(path));
        }
        state.files.insert(absolute_path(path), text.to_string());
        Ok(())
    }
}
