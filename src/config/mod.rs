//! Configuration management.

mod store;

pub use store::{ConfigStore, MemoryConfigStore, TomlConfigStore};

use crate::io::DuplicatePolicy;
use crate::observability::{LogFormat, LoggingConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration for ledgerio.
#[derive(Debug, Clone)]
pub struct LedgerioConfig {
    /// Path to the dossier database.
    pub database_path: PathBuf,
    /// Path to the TOML file holding saved stream formats.
    pub format_store_path: PathBuf,
    /// Defaults applied to import sessions started from the CLI.
    pub defaults: ImportDefaults,
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Config files that were read, in load order.
    pub config_sources: Vec<PathBuf>,
}

/// Import settings used when the command line leaves them unspecified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDefaults {
    /// Duplicate-resolution policy.
    pub duplicate_policy: DuplicatePolicy,
    /// Halt a phase after the first failing line or record.
    pub stop_on_first_error: bool,
    /// Delete the target table content before inserting.
    pub wipe_before_insert: bool,
    /// Name of the stream format to use.
    pub format_name: String,
}

impl Default for ImportDefaults {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::Abort,
            stop_on_first_error: false,
            wipe_before_insert: false,
            format_name: crate::io::DEFAULT_FORMAT_NAME.to_string(),
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Dossier database path.
    pub database_path: Option<String>,
    /// Stream format store path.
    pub format_store_path: Option<String>,
    /// Import defaults.
    pub import: Option<ConfigFileImport>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
}

/// Import section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileImport {
    /// Duplicate policy name (`abort`, `replace`, `ignore`).
    pub duplicate_policy: Option<String>,
    /// Stop on first error.
    pub stop_on_first_error: Option<bool>,
    /// Wipe before insert.
    pub wipe_before_insert: Option<bool>,
    /// Stream format name.
    pub format: Option<String>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLogging {
    /// `EnvFilter` directive.
    pub filter: Option<String>,
    /// Output format (`pretty` or `json`).
    pub format: Option<String>,
    /// Optional log file path.
    pub file: Option<String>,
}

impl Default for LedgerioConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            database_path: data_dir.join("dossier.sqlite"),
            format_store_path: data_dir.join("formats.toml"),
            defaults: ImportDefaults::default(),
            logging: LoggingConfig::default(),
            config_sources: Vec::new(),
        }
    }
}

impl LedgerioConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if it names
    /// an unknown duplicate policy.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::operation("read_config_file", e))?;

        let file: ConfigFile = toml::from_str(&contents)
            .map_err(|e| crate::Error::operation("parse_config_file", e))?;

        let mut config = Self::from_config_file(file)?;
        config.config_sources.push(path.to_path_buf());
        Ok(config)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/ledgerio/` on macOS)
    /// 2. XDG config dir (`~/.config/ledgerio/` for Unix compatibility)
    ///
    /// Returns default configuration if no config file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let platform_config = base_dirs.config_dir().join("ledgerio").join("config.toml");
        if platform_config.exists() {
            if let Ok(config) = Self::load_from_file(&platform_config) {
                return config;
            }
        }

        let xdg_config = base_dirs
            .home_dir()
            .join(".config")
            .join("ledgerio")
            .join("config.toml");
        if xdg_config.exists() {
            if let Ok(config) = Self::load_from_file(&xdg_config) {
                return config;
            }
        }

        Self::default()
    }

    /// Converts a `ConfigFile` to `LedgerioConfig`.
    fn from_config_file(file: ConfigFile) -> crate::Result<Self> {
        let mut config = Self::default();

        if let Some(path) = file.database_path {
            config.database_path = PathBuf::from(path);
        }
        if let Some(path) = file.format_store_path {
            config.format_store_path = PathBuf::from(path);
        }
        if let Some(import) = file.import {
            if let Some(policy) = import.duplicate_policy {
                config.defaults.duplicate_policy = policy.parse()?;
            }
            if let Some(v) = import.stop_on_first_error {
                config.defaults.stop_on_first_error = v;
            }
            if let Some(v) = import.wipe_before_insert {
                config.defaults.wipe_before_insert = v;
            }
            if let Some(name) = import.format {
                config.defaults.format_name = name;
            }
        }
        if let Some(logging) = file.logging {
            if let Some(filter) = logging.filter {
                config.logging.filter = filter;
            }
            if let Some(format) = logging.format {
                config.logging.format = LogFormat::parse(&format);
            }
            config.logging.file = logging.file.map(PathBuf::from);
        }

        Ok(config)
    }

    /// Sets the dossier database path.
    #[must_use]
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    /// Sets the stream format store path.
    #[must_use]
    pub fn with_format_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.format_store_path = path.into();
        self
    }
}

/// Returns the platform data directory, or `.ledgerio` when none exists.
fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "ledgerio")
        .map_or_else(|| PathBuf::from(".ledgerio"), |d| d.data_dir().to_path_buf())
}
