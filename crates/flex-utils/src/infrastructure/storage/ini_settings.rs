//! [`SettingsStore`] backed by one INI file in a [`StoreRegistry`].

use std::path::{Path, PathBuf};

use flex_ini::{FileBackend, FsBackend, StoreError, StoreRegistry};

use crate::application::power_state::SettingsStore;

/// Binds a registry to a single INI path.
///
/// Reads go through [`StoreRegistry::read_value`] and writes through
/// [`StoreRegistry::write_value`], so both inherit the registry's retry
/// policy and share the cached store with every other user of the same file.
pub struct IniSettings<'r, B: FileBackend = FsBackend> {
    registry: &'r StoreRegistry<B>,
    path: PathBuf,
}

impl<'r, B: FileBackend> IniSettings<'r, B> {
    pub fn new(registry: &'r StoreRegistry<B>, path: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<B: FileBackend> SettingsStore for IniSettings<'_, B> {
    fn read(&self, section: &str, key: &str) -> Result<Option<String>, StoreError> {
        let value = self.registry.read_value(&self.path, section, key, "")?;
        Ok((!value.trim().is_empty()).then_some(value))
    }

    fn write(&self, section: &str, key: &str, value: &str) -> Result<bool, StoreError> {
        self.registry.write_value(&self.path, section, key, value)
    }
}
