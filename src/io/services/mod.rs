//! Import and export service implementations.
//!
//! Orchestrates tokenized input, entity parsing, and storage operations.

pub mod export;
pub mod import;

pub use export::{ExportResult, ExportService};
pub use import::{
    DuplicatePolicy, ImportContext, ImportIssue, ImportParameters, ImportPhase, ImportProgress,
    ImportReport, ImportSession, ImportStats, ProgressReporter, SessionState,
};
