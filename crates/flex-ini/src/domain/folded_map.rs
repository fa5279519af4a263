//! Case-insensitive, case-preserving ordered map.
//!
//! Both the section table of an INI document and the key table of each
//! section use this map.  Lookups, insertions and overwrites compare names
//! after Unicode lower-casing, but the map remembers the spelling that was
//! used the first time a name was inserted, and that spelling is what gets
//! written back to disk.
//!
//! # Why not `HashMap<String, V>` with lower-cased keys? (for beginners)
//!
//! Lower-casing the key on the way in would lose the original spelling:
//! a user who wrote `[Global]` by hand would find `[global]` in the file after
//! the next save.  Storing the first spelling next to the value keeps the
//! file looking the way the user wrote it.
//!
//! Iteration is ordered by the folded name, so serialised output is sorted
//! alphabetically without a separate sort step.

use std::collections::btree_map::{self, BTreeMap};

/// A stored value together with the spelling of its name at first insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry<V> {
    name: String,
    value: V,
}

/// Ordered map from case-insensitive names to values.
///
/// # Examples
///
/// ```rust
/// use flex_ini::domain::FoldedMap;
///
/// let mut map = FoldedMap::new();
/// map.insert("Power", 1);
/// map.insert("POWER", 2);
///
/// assert_eq!(map.get("power"), Some(&2));
/// assert_eq!(map.names().collect::<Vec<_>>(), vec!["Power"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldedMap<V> {
    entries: BTreeMap<String, Entry<V>>,
}

/// Folds a name into the form used for comparison and ordering.
pub fn fold(name: &str) -> String {
    name.to_lowercase()
}

impl<V> FoldedMap<V> {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `true` when an entry exists under any casing of `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&fold(name))
    }

    pub fn get(&self, name: &str) -> Option<&V> {
        self.entries.get(&fold(name)).map(|e| &e.value)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut V> {
        self.entries.get_mut(&fold(name)).map(|e| &mut e.value)
    }

    /// Inserts `value` under `name`, replacing any existing value.
    ///
    /// An existing entry keeps its original spelling; only the value changes.
    /// Returns the previous value, if there was one.
    pub fn insert(&mut self, name: &str, value: V) -> Option<V> {
        match self.entries.entry(fold(name)) {
            btree_map::Entry::Occupied(mut occupied) => {
                Some(std::mem::replace(&mut occupied.get_mut().value, value))
            }
            btree_map::Entry::Vacant(vacant) => {
                vacant.insert(Entry {
                    name: name.to_string(),
                    value,
                });
                None
            }
        }
    }

    /// Returns the value under `name`, inserting `make()` first if absent.
    pub fn get_or_insert_with(&mut self, name: &str, make: impl FnOnce() -> V) -> &mut V {
        &mut self
            .entries
            .entry(fold(name))
            .or_insert_with(|| Entry {
                name: name.to_string(),
                value: make(),
            })
            .value
    }

    /// Removes the entry under any casing of `name`.
    pub fn remove(&mut self, name: &str) -> Option<V> {
        self.entries.remove(&fold(name)).map(|e| e.value)
    }

    /// Keeps only the entries for which `keep(name, value)` returns `true`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &V) -> bool) {
        self.entries.retain(|_, e| keep(&e.name, &e.value));
    }

    /// Iterates `(name, value)` pairs in ascending folded-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.values().map(|e| (e.name.as_str(), &e.value))
    }

    /// Iterates names (first-insertion spelling) in ascending folded order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|e| e.name.as_str())
    }
}

impl<V> Default for FoldedMap<V> {
    fn default() -> Self {
        Self::new()
    }
}
