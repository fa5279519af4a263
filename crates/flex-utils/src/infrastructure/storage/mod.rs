//! Storage adapters.
//!
//! - `config`       – the tool's own TOML configuration file.
//! - `ini_settings` – `SettingsStore` over an INI file in a `StoreRegistry`.

pub mod config;
pub mod ini_settings;
