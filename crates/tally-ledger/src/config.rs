//! # Ledger Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TALLY_DB_PATH=/data/tally.db                                       │
//! │     TALLY_REJECT_DUPLICATE_REFS=false                                  │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/tally/ledger.toml (Linux)                                │
//! │     ~/Library/Application Support/com.tally.ledger/ledger.toml (macOS) │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # ledger.toml
//! [database]
//! path = "/var/lib/tally/tally.db"
//! max_connections = 5
//!
//! [posting]
//! reject_duplicate_refs = true
//!
//! [till]
//! default_opening_float_cents = 0
//!
//! [logging]
//! filter = "info,tally=debug,sqlx=warn"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use tally_core::Money;
use tally_db::DbConfig;

pub const DEFAULT_LOG_FILTER: &str = "info,tally=debug,sqlx=warn";

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to save config: {0}")]
    SaveFailed(String),

    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file; `None` resolves to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingSettings {
    /// Reject a second journal for the same (RefType, RefId).
    #[serde(default = "default_true")]
    pub reject_duplicate_refs: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PostingSettings {
    fn default() -> Self {
        PostingSettings {
            reject_duplicate_refs: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TillSettings {
    /// Float used by `TillManager::open` when none is given.
    #[serde(default)]
    pub default_opening_float_cents: i64,
}

impl TillSettings {
    pub fn default_opening_float(&self) -> Money {
        Money::from_cents(self.default_opening_float_cents)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directive; `RUST_LOG` still wins at runtime.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: default_log_filter(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub posting: PostingSettings,

    #[serde(default)]
    pub till: TillSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl LedgerConfig {
    /// Defaults, then the TOML file if one exists, then `TALLY_*` variables.
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let file = config_path.or_else(Self::default_config_path);
        let mut config = match file.as_deref().map(Self::read_file).transpose()? {
            Some(Some(from_file)) => from_file,
            _ => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// `None` when the file is absent; a present but broken file is an error.
    fn read_file(path: &Path) -> ConfigResult<Option<Self>> {
        if !path.is_file() {
            debug!(path = %path.display(), "No ledger config file");
            return Ok(None);
        }
        info!(path = %path.display(), "Reading ledger config");
        let text = std::fs::read_to_string(path)?;
        Ok(Some(toml::from_str(&text)?))
    }

    /// Like `load`, but a bad file or variable falls back to defaults.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        match Self::load(config_path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Ledger config rejected, falling back to defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let Some(path) = config_path.or_else(Self::default_config_path) else {
            return Err(ConfigError::SaveFailed("no writable config location".into()));
        };

        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&path, toml::to_string_pretty(self)?)?;

        info!(path = %path.display(), "Ledger config written");
        Ok(())
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.till.default_opening_float_cents < 0 {
            return Err(ConfigError::Invalid(
                "till.default_opening_float_cents must not be negative".into(),
            ));
        }

        if self.logging.filter.trim().is_empty() {
            return Err(ConfigError::Invalid("logging.filter must not be empty".into()));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("TALLY_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        if let Ok(max) = std::env::var("TALLY_DB_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring non-numeric TALLY_DB_MAX_CONNECTIONS"),
            }
        }

        if let Ok(flag) = std::env::var("TALLY_REJECT_DUPLICATE_REFS") {
            match flag.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.posting.reject_duplicate_refs = true,
                "0" | "false" | "no" | "off" => self.posting.reject_duplicate_refs = false,
                _ => warn!(value = %flag, "Unknown TALLY_REJECT_DUPLICATE_REFS value"),
            }
        }

        if let Ok(float) = std::env::var("TALLY_DEFAULT_FLOAT_CENTS") {
            if let Ok(cents) = float.parse::<i64>() {
                self.till.default_opening_float_cents = cents;
            }
        }

        if let Ok(filter) = std::env::var("TALLY_LOG") {
            self.logging.filter = filter;
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "tally", "ledger")
    }

    /// `<config dir>/ledger.toml` for this platform.
    pub fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("ledger.toml"))
    }

    /// Configured database path, else `<data dir>/tally.db`, else `./tally.db`.
    pub fn database_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .or_else(|| Self::project_dirs().map(|dirs| dirs.data_dir().join("tally.db")))
            .unwrap_or_else(|| PathBuf::from("tally.db"))
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path()).max_connections(self.database.max_connections)
    }
}
