//! Persisted transmit-power settings.
//!
//! The radio has three power presets (low, mid, high).  The watts stored in
//! each preset are remembered separately for every band/transmitter
//! combination, and the preset that was active last is remembered globally.
//!
//! # On-disk layout
//!
//! ```text
//! [Global]
//! CurrentPowerLevel=Mid
//!
//! [20m-A]
//! CurrentTxPowerHigh=100
//! CurrentTxPowerLow=5
//! CurrentTxPowerMid=50
//! ```
//!
//! The band section is named `<band>-<tx>`.
//!
//! # Testability
//!
//! [`PowerState`] talks to storage only through the [`SettingsStore`] trait,
//! so unit tests can substitute an in-memory or mock store.

use std::fmt;
use std::str::FromStr;

use flex_ini::StoreError;
use thiserror::Error;
use tracing::{debug, warn};

/// Section holding settings that do not depend on band or transmitter.
pub const GLOBAL_SECTION: &str = "Global";
pub const KEY_CURRENT_POWER_LEVEL: &str = "CurrentPowerLevel";
pub const KEY_TX_POWER_LOW: &str = "CurrentTxPowerLow";
pub const KEY_TX_POWER_MID: &str = "CurrentTxPowerMid";
pub const KEY_TX_POWER_HIGH: &str = "CurrentTxPowerHigh";

/// Error type for loading and persisting power settings.
#[derive(Debug, Error)]
pub enum PowerStateError {
    /// The underlying INI store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The stored power level is not one of `Low`, `Mid`, `High`.
    #[error("unknown power level: {0:?}")]
    InvalidLevel(String),

    /// A stored wattage is not an integer.
    #[error("invalid value {value:?} for [{section}] {key}")]
    InvalidPower {
        section: String,
        key: &'static str,
        value: String,
    },
}

/// String key/value storage used by [`PowerState`].
#[cfg_attr(test, mockall::automock)]
pub trait SettingsStore {
    /// Returns the stored value, or `None` when it is absent or blank.
    fn read(&self, section: &str, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores a value.  `Ok(false)` means the change is cached but could not
    /// be written yet.
    fn write(&self, section: &str, key: &str, value: &str) -> Result<bool, StoreError>;
}

/// One of the radio's three power presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerLevel {
    #[default]
    Low,
    Mid,
    High,
}

impl PowerLevel {
    pub const ALL: [PowerLevel; 3] = [PowerLevel::Low, PowerLevel::Mid, PowerLevel::High];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Mid => "Mid",
            Self::High => "High",
        }
    }

    /// INI key under which this preset's wattage is stored.
    pub fn power_key(self) -> &'static str {
        match self {
            Self::Low => KEY_TX_POWER_LOW,
            Self::Mid => KEY_TX_POWER_MID,
            Self::High => KEY_TX_POWER_HIGH,
        }
    }
}

impl fmt::Display for PowerLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PowerLevel {
    type Err = PowerStateError;

    /// Accepts `Low`, `Mid` or `High` in any letter case, surrounding
    /// whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| PowerStateError::InvalidLevel(s.to_string()))
    }
}

/// Current power preset plus the wattage remembered for each preset on the
/// active band/transmitter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PowerState {
    pub current_level: PowerLevel,
    pub tx_power_low: i32,
    pub tx_power_mid: i32,
    pub tx_power_high: i32,
    pub band: String,
    pub tx: String,
}

impl PowerState {
    /// Creates a state for `band`/`tx` with every wattage at zero.
    pub fn new(band: impl Into<String>, tx: impl Into<String>) -> Self {
        Self {
            band: band.into(),
            tx: tx.into(),
            ..Self::default()
        }
    }

    /// Name of the section holding this band/transmitter's wattages.
    pub fn band_section(&self) -> String {
        format!("{}-{}", self.band, self.tx)
    }

    /// Wattage stored in the slot of `level`.
    pub fn power_for(&self, level: PowerLevel) -> i32 {
        match level {
            PowerLevel::Low => self.tx_power_low,
            PowerLevel::Mid => self.tx_power_mid,
            PowerLevel::High => self.tx_power_high,
        }
    }

    /// Wattage of the active preset.
    pub fn current_power(&self) -> i32 {
        self.power_for(self.current_level)
    }

    /// Stores `watts` into the slot of the active preset.
    pub fn set_current_power(&mut self, watts: i32) {
        match self.current_level {
            PowerLevel::Low => self.tx_power_low = watts,
            PowerLevel::Mid => self.tx_power_mid = watts,
            PowerLevel::High => self.tx_power_high = watts,
        }
    }

    /// Writes the active preset to `[Global]`.
    ///
    /// Returns `Ok(false)` if the value could not be written yet.
    ///
    /// # Errors
    ///
    /// Non-transient store errors.
    pub fn persist_global(&self, store: &impl SettingsStore) -> Result<bool, PowerStateError> {
        let persisted = store.write(
            GLOBAL_SECTION,
            KEY_CURRENT_POWER_LEVEL,
            self.current_level.as_str(),
        )?;
        if !persisted {
            warn!(level = %self.current_level, "power level not persisted yet");
        }
        Ok(persisted)
    }

    /// Writes all three wattages to the band section.
    ///
    /// Every write is attempted; returns `Ok(true)` only if all were written.
    ///
    /// # Errors
    ///
    /// Non-transient store errors.
    pub fn persist_band(&self, store: &impl SettingsStore) -> Result<bool, PowerStateError> {
        let section = self.band_section();
        let mut all_persisted = true;
        for level in PowerLevel::ALL {
            let watts = self.power_for(level).to_string();
            all_persisted &= store.write(&section, level.power_key(), &watts)?;
        }
        if !all_persisted {
            warn!(section = %section, "band power not persisted yet");
        }
        Ok(all_persisted)
    }

    /// Reloads the active preset and the band's wattages from `store`.
    ///
    /// A missing preset resets the level to [`PowerLevel::Low`].  Missing
    /// wattages leave the in-memory values unchanged.
    ///
    /// # Errors
    ///
    /// [`PowerStateError::InvalidLevel`] / [`PowerStateError::InvalidPower`]
    /// for unparsable stored values, or a non-transient store error.
    pub fn load(&mut self, store: &impl SettingsStore) -> Result<(), PowerStateError> {
        self.current_level = match store.read(GLOBAL_SECTION, KEY_CURRENT_POWER_LEVEL)? {
            Some(text) => text.parse()?,
            None => PowerLevel::Low,
        };

        let section = self.band_section();
        for level in PowerLevel::ALL {
            let key = level.power_key();
            let Some(text) = store.read(&section, key)? else {
                continue;
            };
            let watts = text
                .trim()
                .parse::<i32>()
                .map_err(|_| PowerStateError::InvalidPower {
                    section: section.clone(),
                    key,
                    value: text.clone(),
                })?;
            match level {
                PowerLevel::Low => self.tx_power_low = watts,
                PowerLevel::Mid => self.tx_power_mid = watts,
                PowerLevel::High => self.tx_power_high = watts,
            }
        }

        debug!(
            section = %section,
            level = %self.current_level,
            watts = self.current_power(),
            "loaded power state"
        );
        Ok(())
    }
}
