//! Domain types for the INI store.
//!
//! Everything in this module is pure: no file access, no locks, no logging.
//! The `application` layer wraps these types with concurrency and persistence.

/// Parsing, accessors and rendering of the INI text format.
pub mod document;
/// Case-insensitive, case-preserving ordered map.
pub mod folded_map;

pub use document::{is_blank, IniDocument, Section, DEFAULT_SECTION};
pub use folded_map::FoldedMap;
