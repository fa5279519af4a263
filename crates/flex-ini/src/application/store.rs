//! `IniStore`: a thread-safe, file-backed INI cache.
//!
//! # Locking (for beginners)
//!
//! Each store owns one [`RwLock`].  Any number of threads may hold the read
//! side at once, so lookups never block each other.  The write side is
//! exclusive and is held for the *whole* mutation: the in-memory change and
//! the file rewrite that follows it.  Consequences:
//!
//! - A reader never observes a change while the save for it is still running.
//! - Two writers cannot interleave their saves; writes from different
//!   threads are totally ordered.
//! - The guard is released on every exit path, including `?` returns from a
//!   failed save, because dropping the guard unlocks it.
//!
//! # The dirty flag
//!
//! A mutation marks the store dirty and then saves the complete document.
//! Only a successful save clears the flag.  If the save fails the change stays
//! in memory, and the next mutation (for *any* key) will save again even if
//! its own value did not change.  Persistence is best-effort: data is lost
//! only if the process exits before some later save succeeds.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use super::registry::absolute_path;
use crate::domain::IniDocument;
use crate::error::StoreError;
use crate::infrastructure::storage::fs::FsBackend;
use crate::infrastructure::storage::FileBackend;

#[derive(Debug)]
struct StoreState {
    document: IniDocument,
    dirty: bool,
}

/// In-memory copy of one INI file, written back to disk on every change.
///
/// Construct one store per physical file; [`super::registry::StoreRegistry`]
/// takes care of that.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use flex_ini::application::store::IniStore;
/// use flex_ini::infrastructure::storage::memory::MemoryBackend;
///
/// let store = IniStore::open("settings.ini", Arc::new(MemoryBackend::new())).unwrap();
/// store.set("Power", "Global", "5").unwrap();
/// assert_eq!(store.get("power", "GLOBAL", "0"), "5");
/// ```
#[derive(Debug)]
pub struct IniStore<B: FileBackend = FsBackend> {
    path: PathBuf,
    backend: Arc<B>,
    state: RwLock<StoreState>,
}

impl<B: FileBackend> IniStore<B> {
    /// Loads the file at `path`, creating it (and its directory) if missing.
    ///
    /// A relative `path` is resolved against the current directory once,
    /// here; later saves go to that same file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Transient`] if the file is briefly unavailable and
    /// [`StoreError::Io`] for any other file system failure.  File content
    /// never causes an error.
    pub fn open(path: impl Into<PathBuf>, backend: Arc<B>) -> Result<Self, StoreError> {
        let path = absolute_path(&path.into());
        backend.ensure_exists(&path)?;
        let text = backend.read_shared(&path)?;
        let document = IniDocument::parse(&text);
        debug!(
            path = %path.display(),
            sections = document.section_count(),
            "loaded ini store"
        );

        Ok(Self {
            path,
            backend,
            state: RwLock::new(StoreState {
                document,
                dirty: false,
            }),
        })
    }

    /// Absolute path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the value of `key` in `section`, or `default` when the section
    /// or key is missing or the stored value is blank.
    pub fn get(&self, key: &str, section: &str, default: &str) -> String {
        self.read_state()
            .document
            .get(section, key)
            .unwrap_or(default)
            .to_string()
    }

    /// [`IniStore::get`] with an empty default.
    pub fn get_or_empty(&self, key: &str, section: &str) -> String {
        self.get(key, section, "")
    }

    /// Key names in `section`, sorted; empty if the section does not exist.
    pub fn list_keys(&self, section: &str) -> Vec<String> {
        self.read_state().document.keys(section)
    }

    /// Names of all sections except the default one, sorted.
    pub fn list_sections(&self) -> Vec<String> {
        self.read_state().document.section_names()
    }

    /// Stores `value` under `section`/`key` and saves the whole file if
    /// anything is pending.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the save fails.  The in-memory value is
    /// updated regardless and the store stays dirty.
    pub fn set(&self, key: &str, section: &str, value: &str) -> Result<(), StoreError> {
        let mut state = self.write_state();
        if state.document.set(section, key, value) {
            state.dirty = true;
        }
        if state.dirty {
            self.save(&mut state)?;
        }
        Ok(())
    }

    /// Deletes `section` and saves the file.  A missing section is a no-op.
    ///
    /// Removing the default section clears its keys.
    ///
    /// # Errors
    ///
    /// Same as [`IniStore::set`].
    pub fn remove_section(&self, section: &str) -> Result<(), StoreError> {
        let mut state = self.write_state();
        if !state.document.remove_section(section) {
            return Ok(());
        }
        state.dirty = true;
        self.save(&mut state)
    }

    /// `true` while a change has not been written successfully.
    pub fn is_dirty(&self) -> bool {
        self.read_state().dirty
    }

    /// The exact text the next save would write.
    pub fn render(&self) -> String {
        self.read_state().document.render()
    }

    fn save(&self, state: &mut StoreState) -> Result<(), StoreError> {
        state.document.prune_empty_sections();
        let text = state.document.render();
        self.backend.write_exclusive(&self.path, &text)?;
        state.dirty = false;
        debug!(path = %self.path.display(), bytes = text.len(), "saved ini store");
        Ok(())
    }

    // A panic while holding the lock cannot leave the document half-updated:
    // every mutation is a single map operation.  Recover the guard instead of
    // propagating the poison.
    fn read_state(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DEFAULT_SECTION;
    use crate::error::TransientIo;
    use crate::infrastructure::storage::memory::MemoryBackend;
    use std::io;
    use std::thread;

    const PATH: &str = "settings.ini";

    fn open_with(text: &str) -> (IniStore<MemoryBackend>, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::with_file(PATH, text));
        let store = IniStore::open(PATH, Arc::clone(&backend)).expect("open");
        (store, backend)
    }

    fn on_disk(backend: &MemoryBackend) -> String {
        backend.contents(Path::new(PATH)).unwrap_or_default()
    }

    // ── Loading ───────────────────────────────────────────────────────────────

    #[test]
    fn test_open_creates_missing_file() {
        // Arrange
        let backend = Arc::new(MemoryBackend::new());

        // Act
        let store = IniStore::open(PATH, Arc::clone(&backend)).expect("open");

        // Assert
        assert_eq!(backend.contents(Path::new(PATH)).as_deref(), Some(""));
        assert!(store.list_sections().is_empty());
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_open_parses_existing_content() {
        let (store, _) = open_with("Version=2\n[Global]\nCurrentPowerLevel=High\n");

        assert_eq!(store.get("CurrentPowerLevel", "Global", ""), "High");
        assert_eq!(store.get("Version", DEFAULT_SECTION, ""), "2");
        assert_eq!(store.list_sections(), vec!["Global".to_string()]);
    }

    #[test]
    fn test_open_propagates_transient_read_error() {
        let backend = Arc::new(MemoryBackend::with_file(PATH, ""));
        backend.fail_next_reads(1, TransientIo::SharingViolation);

        let result = IniStore::open(PATH, backend);

        assert!(result.unwrap_err().is_transient());
    }

    #[test]
    fn test_open_resolves_relative_path_once() {
        // Arrange
        let backend = Arc::new(MemoryBackend::new());
        let expected = std::env::current_dir().unwrap().join(PATH);

        // Act
        let store = IniStore::open("nested/../settings.ini", Arc::clone(&backend)).expect("open");
        store.set("Power", "Global", "5").unwrap();

        // Assert
        assert!(store.path().is_absolute());
        assert_eq!(store.path(), expected.as_path());
        assert_eq!(
            backend.contents(&expected).as_deref(),
            Some("[Global]\nPower=5\n")
        );
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_get_unknown_section_returns_default() {
        let (store, _) = open_with("");

        assert_eq!(store.get("K", "Nope", "fallback"), "fallback");
        assert_eq!(store.get("K", "Nope", ""), "");
    }

    #[test]
    fn test_get_or_empty_uses_empty_default() {
        let (store, _) = open_with("[S]\nK=v\n");

        assert_eq!(store.get_or_empty("K", "S"), "v");
        assert_eq!(store.get_or_empty("Missing", "S"), "");
    }

    #[test]
    fn test_list_keys_of_missing_section_is_empty() {
        let (store, _) = open_with("[S]\nB=2\nA=1\n");

        assert_eq!(store.list_keys("s"), vec!["A".to_string(), "B".to_string()]);
        assert!(store.list_keys("Other").is_empty());
    }

    // ── Writes ────────────────────────────────────────────────────────────────

    #[test]
    fn test_set_on_empty_file_writes_single_section() {
        // Arrange
        let (store, backend) = open_with("");

        // Act
        store.set("Power", "Global", "5").expect("set");

        // Assert
        assert_eq!(store.get("Power", "Global", "0"), "5");
        assert_eq!(on_disk(&backend), "[Global]\nPower=5\n");
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_set_is_case_insensitive_and_keeps_first_spelling() {
        let (store, backend) = open_with("");

        store.set("Foo", "Bar", "1").unwrap();
        store.set("FOO", "bar", "2").unwrap();

        assert_eq!(store.get("foo", "bar", ""), "2");
        assert_eq!(on_disk(&backend), "[Bar]\nFoo=2\n");
    }

    #[test]
    fn test_set_whitespace_value_reads_as_default_and_is_not_written() {
        // Arrange
        let (store, backend) = open_with("");

        // Act
        store.set("K", "S", "  ").unwrap();

        // Assert
        assert_eq!(store.get("K", "S", "D"), "D");
        assert_eq!(on_disk(&backend), "");
    }

    #[test]
    fn test_set_same_value_twice_writes_once() {
        // Arrange
        let (store, backend) = open_with("");
        store.set("Power", "Global", "5").unwrap();
        let first = on_disk(&backend);

        // Act
        store.set("Power", "Global", "5").unwrap();

        // Assert – nothing pending, so no second write
        assert_eq!(backend.write_count(), 1);
        assert_eq!(on_disk(&backend), first);
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_overwriting_only_key_with_blank_prunes_section() {
        let (store, backend) = open_with("[Keep]\nA=1\n[Gone]\nB=2\n");

        store.set("B", "Gone", "").unwrap();

        assert_eq!(on_disk(&backend), "[Keep]\nA=1\n");
    }

    #[test]
    fn test_failed_save_keeps_value_in_memory_and_stays_dirty() {
        // Arrange
        let (store, backend) = open_with("");
        backend.fail_next_writes(1, TransientIo::SharingViolation);

        // Act
        let result = store.set("Power", "Global", "5");

        // Assert
        assert!(result.unwrap_err().is_transient());
        assert_eq!(store.get("Power", "Global", "0"), "5");
        assert!(store.is_dirty());
        assert_eq!(on_disk(&backend), "");
    }

    #[test]
    fn test_dirty_flag_carries_over_to_unrelated_key() {
        // Arrange – key A fails to persist
        let (store, backend) = open_with("");
        backend.fail_next_writes(1, TransientIo::SharingViolation);
        let _ = store.set("A", "S", "1");

        // Act – an unrelated write succeeds
        store.set("B", "Other", "2").unwrap();

        // Assert – the pending change to A was flushed too
        assert_eq!(on_disk(&backend), "[Other]\nB=2\n\n[S]\nA=1\n");
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_unchanged_set_still_flushes_pending_state() {
        // Arrange
        let (store, backend) = open_with("");
        backend.fail_next_writes(1, TransientIo::SharingViolation);
        let _ = store.set("Power", "Global", "5");

        // Act – same value again; only the carried-over dirty flag triggers a save
        store.set("Power", "Global", "5").unwrap();

        // Assert
        assert_eq!(backend.write_count(), 2);
        assert_eq!(on_disk(&backend), "[Global]\nPower=5\n");
    }

    #[test]
    fn test_fatal_save_error_propagates() {
        let (store, backend) = open_with("");
        backend.fail_next_write_fatally(io::ErrorKind::PermissionDenied);

        let err = store.set("K", "S", "v").unwrap_err();

        assert!(matches!(err, StoreError::Io { .. }));
        assert!(store.is_dirty());
    }

    // ── Section removal ───────────────────────────────────────────────────────

    #[test]
    fn test_remove_section_persists_immediately() {
        // Arrange
        let (store, backend) = open_with("[A]\nK=1\n[B]\nK=2\n");

        // Act
        store.remove_section("a").unwrap();

        // Assert
        assert_eq!(store.list_sections(), vec!["B".to_string()]);
        assert_eq!(on_disk(&backend), "[B]\nK=2\n");
    }

    #[test]
    fn test_remove_missing_section_is_noop() {
        let (store, backend) = open_with("[A]\nK=1\n");

        store.remove_section("Nope").unwrap();

        assert_eq!(backend.write_count(), 0);
        assert_eq!(store.list_sections(), vec!["A".to_string()]);
    }

    #[test]
    fn test_render_matches_what_save_writes() {
        let (store, backend) = open_with("");
        store.set("X", "Two", "2").unwrap();
        store.set("Y", "One", "1").unwrap();

        assert_eq!(store.render(), on_disk(&backend));
    }

    // ── Concurrency ───────────────────────────────────────────────────────────

    #[test]
    fn test_concurrent_writers_all_land() {
        // Arrange
        let (store, backend) = open_with("");
        let store = Arc::new(store);

        // Act – 8 threads, 25 distinct keys each
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..25 {
                        store
                            .set(&format!("k{i}"), &format!("t{t}"), &i.to_string())
                            .expect("set");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread panicked");
        }

        // Assert
        for t in 0..8 {
            assert_eq!(store.list_keys(&format!("t{t}")).len(), 25);
        }
        let reparsed = IniDocument::parse(&on_disk(&backend));
        assert_eq!(reparsed.section_names().len(), 8);
        assert_eq!(reparsed.get("t7", "k24"), Some("24"));
    }

    #[test]
    fn test_readers_see_whole_values_while_writer_runs() {
        // Arrange – every save fails, so nothing ever reaches disk
        let (store, backend) = open_with("[S]\nK=0\n");
        let store = Arc::new(store);
        backend.fail_next_writes(1_000, TransientIo::SharingViolation);

        // Act
        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 1..=50 {
                    let _ = store.set("K", "S", &i.to_string());
                }
            })
        };
        let reader = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                (0..200)
                    .map(|_| store.get("K", "S", "missing"))
                    .all(|v| v.parse::<u32>().is_ok())
            })
        };
        writer.join().expect("writer panicked");

        // Assert – reads always see a whole value, never the default
        assert!(reader.join().expect("reader panicked"));
        assert_eq!(store.get("K", "S", ""), "50");
        assert!(store.is_dirty());
    }
}
