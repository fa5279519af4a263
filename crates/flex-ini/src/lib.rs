//! # flex-ini
//!
//! Thread-safe, file-backed INI store for persisting small amounts of
//! configuration state across process restarts.
//!
//! # Architecture overview (for beginners)
//!
//! The crate is split into three layers, innermost first:
//!
//! - **`domain`** – The INI document itself: a case-insensitive map of
//!   sections to case-insensitive maps of keys to string values, with a
//!   forgiving parser and a deterministic, sorted renderer.  No I/O.
//!
//! - **`infrastructure`** – The [`FileBackend`] trait and its implementations.
//!   This is the only code that opens files, and the only place where raw OS
//!   errors are turned into [`StoreError`] variants.
//!
//! - **`application`** – [`IniStore`] adds a reader/writer lock and a dirty
//!   flag around one document and saves the complete file after every change.
//!   [`RetryPolicy`] retries "file in use" failures a few times.
//!   [`StoreRegistry`] hands out one store per file path.
//!
//! ```text
//! caller ──► StoreRegistry ──► RetryPolicy ──► IniStore ──► FileBackend ──► disk
//!                 │                              │
//!           Mutex<path → store>            RwLock<document>
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use flex_ini::StoreRegistry;
//!
//! let path = Path::new("/home/me/.config/flexutils/FlexUtils.ini");
//! let registry = StoreRegistry::global();
//!
//! registry.write_value(path, "Global", "CurrentPowerLevel", "High")?;
//! let level = registry.read_value(path, "Global", "CurrentPowerLevel", "Low")?;
//! # Ok::<(), flex_ini::StoreError>(())
//! ```

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use application::registry::{absolute_path, normalize_path, StoreRegistry};
pub use application::retry::{RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};
pub use application::store::IniStore;
pub use domain::{IniDocument, DEFAULT_SECTION};
pub use error::{StoreError, TransientIo};
pub use infrastructure::storage::fs::FsBackend;
pub use infrastructure::storage::memory::MemoryBackend;
pub use infrastructure::storage::FileBackend;
