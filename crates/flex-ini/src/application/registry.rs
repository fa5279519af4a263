//! `StoreRegistry`: one store per file, plus retry-wrapped convenience calls.
//!
//! # Two locks
//!
//! - A coarse [`Mutex`] guards the path → store map, and is held only while
//!   looking up or creating a store.
//! - Each [`IniStore`] has its own reader/writer lock for everything after
//!   that.
//!
//! Paths are normalised (made absolute, `.`/`..` resolved, lower-cased) before
//! lookup, so `C:\Users\Me\App.ini` and `c:/users/me/./app.ini` share a single
//! store and a single lock.  Without this, two in-memory copies of the same
//! file would drift apart and overwrite each other's saves.
//!
//! # Retry behaviour
//!
//! [`StoreRegistry::read_value`] and friends run through the registry's
//! [`RetryPolicy`].  When a transient failure outlasts the budget:
//!
//! - reads return the caller's default,
//! - writes return `Ok(false)`; the change is kept in memory and will be
//!   flushed by the next successful write.
//!
//! Fatal I/O errors are returned as `Err` immediately.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tracing::{debug, warn};

use super::retry::RetryPolicy;
use super::store::IniStore;
use crate::error::StoreError;
use crate::infrastructure::storage::fs::FsBackend;
use crate::infrastructure::storage::FileBackend;

/// Cache of open stores keyed by normalised path.
///
/// Most programs use the process-wide [`StoreRegistry::global`].  Tests build
/// independent instances with [`StoreRegistry::with_backend`].
///
/// # Examples
///
/// ```rust
/// use std::path::Path;
/// use std::sync::Arc;
/// use flex_ini::application::registry::StoreRegistry;
/// use flex_ini::application::retry::RetryPolicy;
/// use flex_ini::infrastructure::storage::memory::MemoryBackend;
///
/// let registry = StoreRegistry::with_backend(Arc::new(MemoryBackend::new()), RetryPolicy::default());
/// let path = Path::new("/settings/FlexUtils.ini");
///
/// assert!(registry.write_value(path, "Global", "CurrentPowerLevel", "High").unwrap());
/// assert_eq!(registry.read_value(path, "global", "currentpowerlevel", "Low").unwrap(), "High");
/// ```
#[derive(Debug)]
pub struct StoreRegistry<B: FileBackend = FsBackend> {
    backend: Arc<B>,
    policy: RetryPolicy,
    stores: Mutex<HashMap<String, Arc<IniStore<B>>>>,
}

impl StoreRegistry<FsBackend> {
    /// Creates a registry over the real file system with the default policy.
    pub fn new() -> Self {
        Self::with_backend(Arc::new(FsBackend), RetryPolicy::default())
    }

    /// The process-wide registry, created on first use and never torn down.
    pub fn global() -> &'static StoreRegistry {
        static GLOBAL: OnceLock<StoreRegistry> = OnceLock::new();
        GLOBAL.get_or_init(StoreRegistry::new)
    }
}

impl Default for StoreRegistry<FsBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: FileBackend> StoreRegistry<B> {
    pub fn with_backend(backend: Arc<B>, policy: RetryPolicy) -> Self {
        Self {
            backend,
            policy,
            stores: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Returns the store for `path`, loading it on first request.
    ///
    /// No retry happens here; see [`StoreRegistry::read_value`] for that.
    ///
    /// # Errors
    ///
    /// Any error from [`IniStore::open`].  A failed load is not cached, so the
    /// next call tries again.
    pub fn store(&self, path: &Path) -> Result<Arc<IniStore<B>>, StoreError> {
        let key = normalize_path(path);
        let mut stores = self.lock_stores();
        if let Some(store) = stores.get(&key) {
            return Ok(Arc::clone(store));
        }

        let store = Arc::new(IniStore::open(path, Arc::clone(&self.backend))?);
        debug!(path = %path.display(), key = %key, "registered ini store");
        stores.insert(key, Arc::clone(&store));
        Ok(store)
    }

    /// Reads `section`/`key`, falling back to `default` when the value is
    /// absent or the file stayed busy for the whole retry budget.
    ///
    /// # Errors
    ///
    /// Non-transient I/O errors while loading the file.
    pub fn read_value(
        &self,
        path: &Path,
        section: &str,
        key: &str,
        default: &str,
    ) -> Result<String, StoreError> {
        let result = self
            .policy
            .run("read", || Ok(self.store(path)?.get(key, section, default)));
        self.or_fallback(result, path, || default.to_string())
    }

    /// Writes `section`/`key` = `value` and persists the file.
    ///
    /// Returns `Ok(true)` once the file is written, `Ok(false)` if it stayed
    /// busy for the whole retry budget.
    ///
    /// # Errors
    ///
    /// Non-transient I/O errors while loading or saving.
    pub fn write_value(
        &self,
        path: &Path,
        section: &str,
        key: &str,
        value: &str,
    ) -> Result<bool, StoreError> {
        let result = self
            .policy
            .run("write", || self.store(path)?.set(key, section, value));
        self.or_fallback(result.map(|()| true), path, || false)
    }

    /// Removes `section` and persists the file.  Same return contract as
    /// [`StoreRegistry::write_value`].
    ///
    /// # Errors
    ///
    /// Non-transient I/O errors while loading or saving.
    pub fn remove_section(&self, path: &Path, section: &str) -> Result<bool, StoreError> {
        let result = self
            .policy
            .run("remove_section", || self.store(path)?.remove_section(section));
        self.or_fallback(result.map(|()| true), path, || false)
    }

    /// Key names of `section`; empty when the file stayed busy.
    ///
    /// # Errors
    ///
    /// Non-transient I/O errors while loading the file.
    pub fn list_keys(&self, path: &Path, section: &str) -> Result<Vec<String>, StoreError> {
        let result = self
            .policy
            .run("list_keys", || Ok(self.store(path)?.list_keys(section)));
        self.or_fallback(result, path, Vec::new)
    }

    /// Named sections of the file; empty when the file stayed busy.
    ///
    /// # Errors
    ///
    /// Non-transient I/O errors while loading the file.
    pub fn list_sections(&self, path: &Path) -> Result<Vec<String>, StoreError> {
        let result = self
            .policy
            .run("list_sections", || Ok(self.store(path)?.list_sections()));
        self.or_fallback(result, path, Vec::new)
    }

    /// Forgets the cached store for `path`.  Returns `true` if one was cached.
    ///
    /// Handles already returned by [`StoreRegistry::store`] keep working; the
    /// next lookup reloads the file from disk.
    pub fn discard(&self, path: &Path) -> bool {
        self.lock_stores().remove(&normalize_path(path)).is_some()
    }

    /// Number of cached stores.
    pub fn len(&self) -> usize {
        self.lock_stores().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn or_fallback<T>(
        &self,
        result: Result<T, StoreError>,
        path: &Path,
        fallback: impl FnOnce() -> T,
    ) -> Result<T, StoreError> {
        match result {
            Err(StoreError::RetriesExhausted {
                operation,
                attempts,
                last,
            }) => {
                warn!(
                    path = %path.display(),
                    operation,
                    attempts,
                    error = %last,
                    "file stayed busy; giving up on this call"
                );
                Ok(fallback())
            }
            other => other,
        }
    }

    fn lock_stores(&self) -> MutexGuard<'_, HashMap<String, Arc<IniStore<B>>>> {
        self.stores.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Resolves `path` against the current directory and removes `.`/`..`
/// segments.
///
/// The file system is not consulted, so the path need not exist.
pub fn absolute_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut resolved = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other.as_os_str()),
        }
    }
    resolved
}

/// Folds a path into the registry key: [`absolute_path`], separators
/// unified, lower-cased.
pub fn normalize_path(path: &Path) -> String {
    absolute_path(path).to_string_lossy().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransientIo;
    use crate::infrastructure::storage::memory::MemoryBackend;
    use mockall::{mock, Sequence};
    use std::io;
    use std::thread;
    use std::time::Duration;

    mock! {
        pub Backend {}

        impl FileBackend for Backend {
            fn ensure_exists(&self, path: &Path) -> Result<(), StoreError>;
            fn read_shared(&self, path: &Path) -> Result<String, StoreError>;
            fn write_exclusive(&self, path: &Path, text: &str) -> Result<(), StoreError>;
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::ZERO)
    }

    fn memory_registry() -> (StoreRegistry<MemoryBackend>, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        (
            StoreRegistry::with_backend(Arc::clone(&backend), fast_policy()),
            backend,
        )
    }

    fn sharing_violation(path: &Path) -> StoreError {
        StoreError::Transient {
            kind: TransientIo::SharingViolation,
            path: path.to_path_buf(),
        }
    }

    // ── Path normalisation ────────────────────────────────────────────────────

    #[test]
    fn test_normalize_path_folds_case_and_dot_segments() {
        // Arrange
        let a = Path::new("/Settings/App/FlexUtils.INI");
        let b = Path::new("/settings/./other/../app/flexutils.ini");

        // Act / Assert
        assert_eq!(normalize_path(a), normalize_path(b));
    }

    #[test]
    fn test_normalize_path_makes_relative_paths_absolute() {
        let key = normalize_path(Path::new("flexutils.ini"));
        let expected = std::env::current_dir()
            .unwrap()
            .join("flexutils.ini")
            .to_string_lossy()
            .to_lowercase();

        assert_eq!(key, expected);
    }

    // ── Store cache ───────────────────────────────────────────────────────────

    #[test]
    fn test_same_file_under_different_spellings_shares_one_store() {
        // Arrange
        let (registry, _) = memory_registry();

        // Act
        let first = registry.store(Path::new("/cfg/FlexUtils.ini")).unwrap();
        let second = registry.store(Path::new("/CFG/./flexutils.ini")).unwrap();

        // Assert
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_store_loads_file_only_once() {
        let (registry, backend) = memory_registry();
        let path = Path::new("/cfg/a.ini");

        registry.store(path).unwrap();
        registry.store(path).unwrap();

        assert_eq!(backend.read_count(), 1);
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        // Arrange
        let (registry, backend) = memory_registry();
        backend.fail_next_reads(1, TransientIo::SharingViolation);
        let path = Path::new("/cfg/a.ini");

        // Act
        let first = registry.store(path);
        let second = registry.store(path);

        // Assert
        assert!(first.unwrap_err().is_transient());
        assert!(second.is_ok());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_discard_forces_reload() {
        // Arrange
        let (registry, backend) = memory_registry();
        let path = Path::new("/cfg/a.ini");
        let first = registry.store(path).unwrap();

        // Act
        let discarded = registry.discard(path);
        let second = registry.store(path).unwrap();

        // Assert
        assert!(discarded);
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(backend.read_count(), 2);
        assert!(!registry.discard(Path::new("/cfg/unknown.ini")));
    }

    #[test]
    fn test_independent_registries_do_not_share_stores() {
        let backend = Arc::new(MemoryBackend::new());
        let one = StoreRegistry::with_backend(Arc::clone(&backend), fast_policy());
        let two = StoreRegistry::with_backend(Arc::clone(&backend), fast_policy());
        let path = Path::new("/cfg/a.ini");

        let a = one.store(path).unwrap();
        let b = two.store(path).unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_global_registry_is_a_singleton() {
        assert!(std::ptr::eq(StoreRegistry::global(), StoreRegistry::global()));
        assert_eq!(StoreRegistry::global().policy(), RetryPolicy::default());
    }

    #[test]
    fn test_concurrent_first_use_creates_one_store() {
        // Arrange
        let (registry, backend) = memory_registry();
        let registry = Arc::new(registry);

        // Act
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.store(Path::new("/cfg/race.ini")).unwrap())
            })
            .collect();
        let stores: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("thread panicked"))
            .collect();

        // Assert
        assert!(stores.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(backend.read_count(), 1);
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_read_of_unwritten_section_returns_default() {
        let (registry, _) = memory_registry();
        let path = Path::new("/cfg/a.ini");

        for default in ["", "0", "Low", "  "] {
            assert_eq!(
                registry.read_value(path, "Never", "Written", default).unwrap(),
                default
            );
        }
    }

    #[test]
    fn test_read_retries_busy_load() {
        // Arrange
        let backend = Arc::new(MemoryBackend::with_file("/cfg/a.ini", "[Global]\nPower=5\n"));
        backend.fail_next_reads(2, TransientIo::UserMappedSection);
        let registry = StoreRegistry::with_backend(Arc::clone(&backend), fast_policy());

        // Act
        let value = registry
            .read_value(Path::new("/cfg/a.ini"), "Global", "Power", "0")
            .unwrap();

        // Assert
        assert_eq!(value, "5");
        assert_eq!(backend.read_count(), 3);
    }

    #[test]
    fn test_read_falls_back_to_default_when_budget_exhausted() {
        // Arrange
        let backend = Arc::new(MemoryBackend::with_file("/cfg/a.ini", "[Global]\nPower=5\n"));
        backend.fail_next_reads(10, TransientIo::SharingViolation);
        let registry = StoreRegistry::with_backend(Arc::clone(&backend), fast_policy());

        // Act
        let value = registry
            .read_value(Path::new("/cfg/a.ini"), "Global", "Power", "0")
            .unwrap();

        // Assert – 4 attempts, then the default
        assert_eq!(value, "0");
        assert_eq!(backend.read_count(), 4);
    }

    #[test]
    fn test_list_calls_fall_back_to_empty_when_budget_exhausted() {
        let backend = Arc::new(MemoryBackend::with_file("/cfg/a.ini", "[S]\nK=v\n"));
        backend.fail_next_reads(8, TransientIo::SharingViolation);
        let registry = StoreRegistry::with_backend(Arc::clone(&backend), fast_policy());
        let path = Path::new("/cfg/a.ini");

        assert!(registry.list_sections(path).unwrap().is_empty());
        assert!(registry.list_keys(path, "S").unwrap().is_empty());
        assert_eq!(registry.list_keys(path, "S").unwrap(), vec!["K".to_string()]);
    }

    // ── Writes ────────────────────────────────────────────────────────────────

    #[test]
    fn test_write_succeeds_after_two_sharing_violations() {
        // Arrange – strict call sequence: two busy writes, then the real one
        let path = Path::new("/cfg/FlexUtils.ini");
        let mut backend = MockBackend::new();
        let mut seq = Sequence::new();
        backend.expect_ensure_exists().times(1).returning(|_| Ok(()));
        backend
            .expect_read_shared()
            .times(1)
            .returning(|_| Ok(String::new()));
        backend
            .expect_write_exclusive()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|p, _| Err(sharing_violation(p)));
        backend
            .expect_write_exclusive()
            .withf(|_, text| text.to_string() == "[Global]\nPower=5\n")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        let registry = StoreRegistry::with_backend(Arc::new(backend), fast_policy());

        // Act
        let persisted = registry.write_value(path, "Global", "Power", "5");

        // Assert
        assert!(persisted.unwrap());
        assert_eq!(registry.read_value(path, "Global", "Power", "0").unwrap(), "5");
        assert!(!registry.store(path).unwrap().is_dirty());
    }

    #[test]
    fn test_write_reports_false_when_budget_exhausted() {
        // Arrange
        let (registry, backend) = memory_registry();
        let path = Path::new("/cfg/a.ini");
        backend.fail_next_writes(4, TransientIo::SharingViolation);

        // Act
        let persisted = registry.write_value(path, "Global", "Power", "5").unwrap();

        // Assert – value is cached, file untouched, store dirty
        assert!(!persisted);
        assert_eq!(backend.write_count(), 4);
        assert_eq!(registry.read_value(path, "Global", "Power", "0").unwrap(), "5");
        assert!(registry.store(path).unwrap().is_dirty());
        assert_eq!(backend.contents(path).as_deref(), Some(""));
    }

    #[test]
    fn test_next_write_flushes_state_left_by_exhausted_write() {
        // Arrange
        let (registry, backend) = memory_registry();
        let path = Path::new("/cfg/a.ini");
        backend.fail_next_writes(4, TransientIo::SharingViolation);
        assert!(!registry.write_value(path, "A", "K", "1").unwrap());

        // Act
        let persisted = registry.write_value(path, "B", "K", "2").unwrap();

        // Assert
        assert!(persisted);
        assert_eq!(backend.contents(path).as_deref(), Some("[A]\nK=1\n\n[B]\nK=2\n"));
    }

    #[test]
    fn test_fatal_write_error_is_returned_without_retry() {
        // Arrange
        let path = Path::new("/cfg/a.ini");
        let mut backend = MockBackend::new();
        backend.expect_ensure_exists().returning(|_| Ok(()));
        backend.expect_read_shared().returning(|_| Ok(String::new()));
        backend.expect_write_exclusive().times(1).returning(|p, _| {
            Err(StoreError::Io {
                path: p.to_path_buf(),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            })
        });
        let registry = StoreRegistry::with_backend(Arc::new(backend), fast_policy());

        // Act
        let result = registry.write_value(path, "Global", "Power", "5");

        // Assert
        assert!(matches!(result, Err(StoreError::Io { .. })));
    }

    #[test]
    fn test_fatal_load_error_is_returned_from_read() {
        let mut backend = MockBackend::new();
        backend.expect_ensure_exists().times(1).returning(|p| {
            Err(StoreError::Io {
                path: p.to_path_buf(),
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            })
        });
        let registry = StoreRegistry::with_backend(Arc::new(backend), fast_policy());

        let result = registry.read_value(Path::new("/cfg/a.ini"), "S", "K", "d");

        assert!(matches!(result, Err(StoreError::Io { .. })));
    }

    #[test]
    fn test_remove_section_persists_through_registry() {
        let (registry, backend) = memory_registry();
        let path = Path::new("/cfg/a.ini");
        registry.write_value(path, "Keep", "K", "1").unwrap();
        registry.write_value(path, "Drop", "K", "2").unwrap();

        assert!(registry.remove_section(path, "drop").unwrap());

        assert_eq!(registry.list_sections(path).unwrap(), vec!["Keep".to_string()]);
        assert_eq!(backend.contents(path).as_deref(), Some("[Keep]\nK=1\n"));
    }
}
