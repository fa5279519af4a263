//! In-memory INI document: parsing and rendering.
//!
//! # File format
//!
//! ```text
//! ; comment lines start with a semicolon
//! Version=2
//!
//! [Global]
//! CurrentPowerLevel=High
//!
//! [20m-A]
//! CurrentTxPowerHigh=100
//! CurrentTxPowerLow=5
//! ```
//!
//! - Lines before the first `[section]` header belong to the default section,
//!   whose name is the empty string ([`DEFAULT_SECTION`]).
//! - `key=value` splits on the first `=`.  The key is trimmed; the value is
//!   kept exactly as written after the `=`.
//! - A line with no `=` is a key with an empty value.
//! - There is no escaping.  `[`, `]`, `;` and `=` have no special meaning
//!   inside names or values beyond the rules above.
//!
//! Parsing never fails.  Malformed lines degrade to keys with empty values,
//! and a repeated `[section]` header replaces the earlier section.
//!
//! Empty and whitespace-only values are *absent* as far as readers and the
//! file are concerned: they are skipped when rendering and reads fall back to
//! the caller's default.  They still live in memory until the document is
//! re-parsed.

use super::folded_map::FoldedMap;

/// Name of the section that holds keys appearing before any header.
pub const DEFAULT_SECTION: &str = "";

/// Key table of a single section.
pub type Section = FoldedMap<String>;

/// `true` for values that are never persisted and never returned to readers.
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Parsed representation of an INI file.
///
/// The default section always exists.  Named sections may be empty in memory
/// (right after creation or after their last key is gone) but empty sections
/// are never rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniDocument {
    sections: FoldedMap<Section>,
}

impl IniDocument {
    /// Creates a document containing only the (empty) default section.
    pub fn new() -> Self {
        let mut sections = FoldedMap::new();
        sections.insert(DEFAULT_SECTION, Section::new());
        Self { sections }
    }

    /// Parses INI text.  See the module documentation for the accepted format.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flex_ini::domain::IniDocument;
    ///
    /// let doc = IniDocument::parse("[Global]\nPower= 5 \n");
    /// assert_eq!(doc.get("global", "POWER"), Some(" 5"));
    /// ```
    pub fn parse(text: &str) -> Self {
        let mut doc = Self::new();
        let mut current = DEFAULT_SECTION.to_string();

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if line.starts_with(';') {
                continue;
            }

            if let Some(name) = section_header(line) {
                doc.sections.insert(name, Section::new());
                current = name.to_string();
                continue;
            }

            let (key, value) = match line.split_once('=') {
                Some((key, value)) => (key.trim(), value),
                None => (line, ""),
            };
            doc.sections
                .get_or_insert_with(&current, Section::new)
                .insert(key, value.to_string());
        }

        doc
    }

    /// Returns the stored value, or `None` when the section or key is absent
    /// or the value is blank.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)?
            .get(key)
            .map(String::as_str)
            .filter(|v| !is_blank(v))
    }

    /// `true` if the section exists in memory, even when it has no keys.
    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains(section)
    }

    /// Key names of `section` in ascending order; empty if the section is absent.
    ///
    /// Keys whose value is blank are included: they exist in memory even
    /// though they will not be written.
    pub fn keys(&self, section: &str) -> Vec<String> {
        self.sections
            .get(section)
            .map(|s| s.names().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Names of all sections except the default one, in ascending order.
    pub fn section_names(&self) -> Vec<String> {
        self.sections
            .names()
            .filter(|name| *name != DEFAULT_SECTION)
            .map(str::to_string)
            .collect()
    }

    /// Number of sections held in memory, the default section included.
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Stores `value` under `section`/`key`, creating the section if needed.
    ///
    /// Returns `true` when the document changed: the section was created, the
    /// key was added, or the old value differs (ordinal comparison).
    pub fn set(&mut self, section: &str, key: &str, value: &str) -> bool {
        let mut changed = false;
        let entries = self.sections.get_or_insert_with(section, || {
            changed = true;
            Section::new()
        });

        match entries.get_mut(key) {
            Some(existing) => {
                if existing.as_str() != value {
                    *existing = value.to_string();
                    changed = true;
                }
            }
            None => {
                entries.insert(key, value.to_string());
                changed = true;
            }
        }
        changed
    }

    /// Removes a named section.  Returns `true` if something was removed.
    ///
    /// Removing the default section clears its keys instead, so the default
    /// section keeps existing.
    pub fn remove_section(&mut self, section: &str) -> bool {
        if section == DEFAULT_SECTION {
            return match self.sections.get_mut(DEFAULT_SECTION) {
                Some(entries) if !entries.is_empty() => {
                    *entries = Section::new();
                    true
                }
                _ => false,
            };
        }
        self.sections.remove(section).is_some()
    }

    /// Drops named sections that hold no keys at all.  Returns how many were dropped.
    pub fn prune_empty_sections(&mut self) -> usize {
        let before = self.sections.len();
        self.sections
            .retain(|name, entries| name == DEFAULT_SECTION || !entries.is_empty());
        before - self.sections.len()
    }

    /// Renders the document as INI text.
    ///
    /// Sections appear in ascending name order, the default section first and
    /// without a header.  Keys appear in ascending order as `key=value`.
    /// Blank values are skipped, and a section with nothing left to write is
    /// skipped entirely.  Sections are separated by one blank line.
    pub fn render(&self) -> String {
        let mut out = String::new();

        for (name, entries) in self.sections.iter() {
            let mut persisted = entries.iter().filter(|(_, v)| !is_blank(v)).peekable();
            if persisted.peek().is_none() {
                continue;
            }

            if !out.is_empty() {
                out.push('\n');
            }
            if name != DEFAULT_SECTION {
                out.push('[');
                out.push_str(name);
                out.push_str("]\n");
            }
            for (key, value) in persisted {
                out.push_str(key);
                out.push('=');
                out.push_str(value);
                out.push('\n');
            }
        }

        out
    }
}

impl Default for IniDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the name inside `[name]`, or `None` if `line` is not a header.
fn section_header(line: &str) -> Option<&str> {
    line.strip_prefix('[')?.strip_suffix(']')
}
