//! # Ledgerio
//!
//! Bulk import and export of bookkeeping entities through configurable
//! delimited-text dialects.
//!
//! Ledgerio loads accounts, classes and bank account transactions into a
//! dossier store from untrusted delimited files. A failed bulk load never
//! leaves the store partially written: every session snapshots its target
//! table before mutating it and restores the snapshot on any insert error.
//!
//! ## Features
//!
//! - Named stream formats (charmap, date format, separators, header handling)
//!   persisted per mode in a configuration store
//! - Provider discovery through an ordered capability registry
//! - Two-phase (parse, then insert) import sessions with Abort/Replace/Ignore
//!   duplicate policies
//! - Backup/restore safety net over a `SQLite` dossier
//!
//! ## Example
//!
//! ```rust,ignore
//! use ledgerio::io::{ImportParameters, ImportSession, StreamFormat, StreamMode, Tokenizer};
//! use ledgerio::models::{Class, EntityType};
//!
//! let format = StreamFormat::new("Default", StreamMode::Import);
//! let lines = Tokenizer::new(&format)?.tokenize(file)?;
//! let params = ImportParameters::new("classes.csv", format, EntityType::Class);
//! let report = ImportSession::<Class>::new(&params, ctx).run(lines)?;
//! println!("{} inserted", report.stats.inserted_count);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod io;
pub mod models;
pub mod observability;
pub mod storage;

// Re-exports for convenience
pub use config::{ConfigStore, LedgerioConfig, MemoryConfigStore, TomlConfigStore};
pub use io::{
    CapabilityRegistry, DuplicatePolicy, ImportParameters, ImportReport, ImportSession,
    ImportStats, StreamFormat, StreamMode,
};
pub use models::{EntityType, StoreEvent};
pub use storage::{SqliteStore, StoreConnection};

/// Error type for ledgerio operations.
///
/// Record-level problems met while importing (malformed lines, rejected
/// inserts, duplicate keys) are not errors: they are counted in
/// [`io::ImportStats`] and listed in the session report.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Malformed persisted formats, unsupported charmaps, unknown entity names |
/// | `OperationFailed` | File I/O, configuration parsing, logging setup |
/// | `Connection` | Any failing statement against the dossier store |
/// | `NotFound` | A named stream format does not exist |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The dossier store rejected a statement.
    ///
    /// Fatal for the running import phase, regardless of the
    /// stop-on-first-error setting.
    #[error("store connection error in '{operation}': {cause}")]
    Connection {
        /// The store operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A requested item does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Builds an [`Error::OperationFailed`] from any displayable cause.
    pub fn operation(operation: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }

    /// Builds an [`Error::Connection`] from any displayable cause.
    pub fn connection(operation: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::Connection {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for ledgerio operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
