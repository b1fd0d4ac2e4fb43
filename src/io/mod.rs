//! Import/Export I/O subsystem.
//!
//! Moves dossier entities in and out of delimited text files.
//!
//! # Architecture
//!
//! - [`StreamFormat`] describes a text dialect and persists itself in a
//!   [`crate::config::ConfigStore`]
//! - [`Tokenizer`] splits a byte stream into lines of fields
//! - [`CapabilityRegistry`] finds the [`ImportProvider`] willing to import a
//!   resource
//! - [`ImportSession`] parses lines into records and inserts them under a
//!   duplicate policy, with a table snapshot as safety net
//! - [`ExportService`] writes a table back out with an Export format
//!
//! # Examples
//!
//! ## Import classes from a file
//!
//! ```rust,ignore
//! use ledgerio::io::{CapabilityRegistry, ImportContext, ImportParameters, ImportPipeline, StreamFormat, StreamMode};
//!
//! let format = StreamFormat::load_or_new(&formats, "Default", StreamMode::Import)?;
//! let params = ImportParameters::new("classes.csv", format, EntityType::Class)
//!     .with_duplicate_policy(DuplicatePolicy::Ignore);
//! let pipeline = ImportPipeline::new(CapabilityRegistry::with_builtin_providers());
//! let report = pipeline.run(&params, &ImportContext::new(&store, &events, &cache))?;
//! println!("Inserted {} classes", report.stats.inserted_count);
//! ```
//!
//! ## Export classes
//!
//! ```rust,ignore
//! use ledgerio::io::ExportService;
//!
//! let result = ExportService::new(&store).export_to_file::<Class>(path, &format)?;
//! println!("Exported {} classes", result.exported);
//! ```

pub mod pipeline;
pub mod providers;
pub mod registry;
pub mod services;
pub mod stream_format;
pub mod tokenizer;

// Re-exports for convenience
pub use pipeline::ImportPipeline;
pub use providers::{BankStatementProvider, DelimitedFileProvider};
pub use registry::{
    CapabilityRegistry, DEFAULT_CONTRACT_VERSION, ImportProvider, ProviderRef, ResolvedProvider,
    Willingness,
};
pub use services::{
    DuplicatePolicy, ExportResult, ExportService, ImportContext, ImportIssue, ImportParameters,
    ImportPhase, ImportProgress, ImportReport, ImportSession, ImportStats, ProgressReporter,
    SessionState,
};
pub use stream_format::{
    DEFAULT_CHARMAP, DEFAULT_FORMAT_NAME, DateFormat, FormatIndicators, FormatSettings,
    HeaderPolicy, StreamFormat, StreamMode,
};
pub use tokenizer::{TokenizedLine, Tokenizer, count_records};
