//! Application layer: radio settings logic.
//!
//! # What lives here? (for beginners)
//!
//! Rules about *what* gets stored and *how values are interpreted*.  Storage
//! itself is reached through the `SettingsStore` trait, so this code runs the
//! same against a real INI file and against a test double.

pub mod power_state;
