//! FlexUtils settings tool: entry point.
//!
//! Reads and edits the INI settings file shared with the radio control
//! application.  Every write goes through the same store as the application
//! itself: names are case-insensitive, the whole file is rewritten in a
//! canonical order, and a file briefly held open by another program is
//! retried before giving up.
//!
//! # Usage
//!
//! ```text
//! flex-utils [OPTIONS] <COMMAND>
//!
//! Commands:
//!   get <SECTION> <KEY> [--default D]   Print one value
//!   set <SECTION> <KEY> <VALUE>         Store one value
//!   keys <SECTION>                      List key names
//!   sections                            List section names
//!   remove-section <SECTION>            Delete a section
//!   dump [--raw]                        Print the whole file (JSON or INI)
//!   power [--band B] [--tx T] show|level <LEVEL>|watts <N>
//!
//! Options:
//!   --ini    <PATH>   Settings file        [env: FLEXUTILS_INI]
//!   --config <PATH>   Tool config (TOML)   [env: FLEXUTILS_CONFIG]
//! ```
//!
//! Write commands exit with status 1 if the file stayed busy and the change
//! could not be saved.
//!
//! # Logging
//!
//! Log lines go to stderr.  `RUST_LOG` overrides `general.log_level` from the
//! config file.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use flex_ini::{FileBackend, FsBackend, StoreRegistry, DEFAULT_SECTION};
use flex_utils::application::power_state::{PowerLevel, PowerState};
use flex_utils::infrastructure::storage::config::{
    config_file_path, load_config, AppConfig, ConfigError,
};
use flex_utils::infrastructure::storage::ini_settings::IniSettings;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Inspect and edit the FlexUtils settings file.
#[derive(Debug, Parser)]
#[command(name = "flex-utils", about = "Inspect and edit the FlexUtils settings file", version)]
struct Cli {
    /// Settings file.  Overrides `storage.ini_path` from the config file.
    #[arg(long, env = "FLEXUTILS_INI")]
    ini: Option<PathBuf>,

    /// Tool configuration file.  Defaults to `config.toml` in the platform
    /// config directory.
    #[arg(long, env = "FLEXUTILS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the value of KEY in SECTION.  Use "" for the default section.
    Get {
        section: String,
        key: String,
        /// Printed when the value is absent or blank.
        #[arg(long, default_value = "")]
        default: String,
    },
    /// Store VALUE under SECTION/KEY.  An empty VALUE deletes the key on save.
    Set {
        section: String,
        key: String,
        value: String,
    },
    /// List the key names of SECTION.
    Keys { section: String },
    /// List the named sections.
    Sections,
    /// Delete SECTION and all of its keys.
    RemoveSection { section: String },
    /// Print every section as JSON, or the file text with --raw.
    Dump {
        #[arg(long)]
        raw: bool,
    },
    /// Show or change the persisted transmit power.
    Power {
        /// Band name, e.g. `20m`.
        #[arg(long, default_value = "", global = true)]
        band: String,
        /// Transmitter name, e.g. `A`.
        #[arg(long, default_value = "", global = true)]
        tx: String,
        #[command(subcommand)]
        action: PowerAction,
    },
}

#[derive(Debug, Subcommand)]
enum PowerAction {
    /// Print the active preset and the wattage of each preset.
    Show,
    /// Make LEVEL (low, mid, high) the active preset.
    Level { level: PowerLevel },
    /// Store WATTS in the active preset of the band/transmitter.
    Watts { watts: i32 },
}

// ── Command execution ─────────────────────────────────────────────────────────

/// Runs `command` against the settings file at `ini`, printing to `out`.
///
/// Returns `Ok(false)` when a write could not be saved because the file
/// stayed busy.
fn execute<B: FileBackend>(
    command: &Command,
    registry: &StoreRegistry<B>,
    ini: &Path,
    out: &mut impl Write,
) -> anyhow::Result<bool> {
    match command {
        Command::Get {
            section,
            key,
            default,
        } => {
            let value = registry.read_value(ini, section, key, default)?;
            writeln!(out, "{value}")?;
            Ok(true)
        }
        Command::Set {
            section,
            key,
            value,
        } => Ok(registry.write_value(ini, section, key, value)?),
        Command::Keys { section } => {
            for key in registry.list_keys(ini, section)? {
                writeln!(out, "{key}")?;
            }
            Ok(true)
        }
        Command::Sections => {
            for section in registry.list_sections(ini)? {
                writeln!(out, "{section}")?;
            }
            Ok(true)
        }
        Command::RemoveSection { section } => Ok(registry.remove_section(ini, section)?),
        Command::Dump { raw: true } => {
            let store = registry.store(ini)?;
            write!(out, "{}", store.render())?;
            Ok(true)
        }
        Command::Dump { raw: false } => {
            let dump = dump_json(registry, ini)?;
            writeln!(out, "{}", serde_json::to_string_pretty(&dump)?)?;
            Ok(true)
        }
        Command::Power { band, tx, action } => {
            let settings = IniSettings::new(registry, ini);
            let mut state = PowerState::new(band.as_str(), tx.as_str());
            state.load(&settings)?;
            match action {
                PowerAction::Show => {
                    writeln!(out, "level: {}", state.current_level)?;
                    for level in PowerLevel::ALL {
                        writeln!(out, "{level}: {} W", state.power_for(level))?;
                    }
                    Ok(true)
                }
                PowerAction::Level { level } => {
                    state.current_level = *level;
                    Ok(state.persist_global(&settings)?)
                }
                PowerAction::Watts { watts } => {
                    state.set_current_power(*watts);
                    Ok(state.persist_band(&settings)?)
                }
            }
        }
    }
}

/// Section → key → value, blank values left out.  The default section
/// appears under `""` when it holds anything.
fn dump_json<B: FileBackend>(
    registry: &StoreRegistry<B>,
    ini: &Path,
) -> anyhow::Result<BTreeMap<String, BTreeMap<String, String>>> {
    let mut dump = BTreeMap::new();
    let sections = std::iter::once(DEFAULT_SECTION.to_string()).chain(registry.list_sections(ini)?);
    for section in sections {
        let mut values = BTreeMap::new();
        for key in registry.list_keys(ini, &section)? {
            let value = registry.read_value(ini, &section, &key, "")?;
            if !value.trim().is_empty() {
                values.insert(key, value);
            }
        }
        if !values.is_empty() || section != DEFAULT_SECTION {
            dump.insert(section, values);
        }
    }
    Ok(dump)
}

/// Loads the tool config from `--config`, or from the platform default when
/// one can be resolved.
fn resolve_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => match config_file_path() {
            Ok(path) => path,
            Err(ConfigError::NoPlatformConfigDir) => return Ok(AppConfig::default()),
            Err(e) => return Err(e.into()),
        },
    };
    load_config(&path).with_context(|| format!("failed to load config from {}", path.display()))
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    // ── Logging setup ─────────────────────────────────────────────────────────
    //
    // `RUST_LOG` wins; otherwise the level from the config file applies.
    // Output goes to stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let ini = match &cli.ini {
        Some(path) => path.clone(),
        None => config
            .ini_path()
            .context("no --ini given and no default settings location")?,
    };
    debug!(ini = %ini.display(), "using settings file");

    let registry = StoreRegistry::with_backend(Arc::new(FsBackend), config.retry.policy());
    let mut stdout = io::stdout().lock();
    let persisted = execute(&cli.command, &registry, &ini, &mut stdout)
        .with_context(|| format!("failed to access settings file {}", ini.display()))?;

    if persisted {
        Ok(ExitCode::SUCCESS)
    } else {
        info!(ini = %ini.display(), "settings file stayed busy; change not saved");
        eprintln!("settings file {} is busy; change not saved", ini.display());
        Ok(ExitCode::FAILURE)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
