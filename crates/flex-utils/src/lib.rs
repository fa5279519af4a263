//! # flex-utils
//!
//! Radio transmit-power settings persisted through the `flex-ini` store, plus
//! the configuration used by the `flex-utils` command-line tool.
//!
//! # Layers
//!
//! ```text
//! application/     PowerLevel, PowerState, SettingsStore trait
//! infrastructure/
//!   storage/       TOML app config, SettingsStore over an INI file
//! ```
//!
//! The application layer never touches the file system directly; it only sees
//! the [`application::power_state::SettingsStore`] trait.

pub mod application;
pub mod infrastructure;
