//! Import and export command handlers.

use ledgerio::config::{LedgerioConfig, TomlConfigStore};
use ledgerio::io::{
    CapabilityRegistry, DuplicatePolicy, ExportService, ImportContext, ImportParameters,
    ImportPipeline, ImportProgress, ImportReport, ProgressReporter, StreamFormat, StreamMode,
};
use ledgerio::models::{Account, BankTransaction, Class, EntityType, dossier_schema};
use ledgerio::observability::EventBus;
use ledgerio::storage::{RecordCache, SqliteStore};
use ledgerio::{Error, Result};
use std::path::{Path, PathBuf};

/// Maximum number of issues printed after an import.
const MAX_PRINTED_ISSUES: usize = 10;

/// Opens the dossier, creating its parent directory if needed.
fn open_dossier(config: &LedgerioConfig, db: Option<PathBuf>) -> Result<SqliteStore> {
    let path = db.unwrap_or_else(|| config.database_path.clone());
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::operation("create_dossier_dir", e))?;
    }
    SqliteStore::open(&path, &dossier_schema())
}

fn load_format(
    config: &LedgerioConfig,
    name: Option<String>,
    mode: StreamMode,
) -> Result<StreamFormat> {
    let formats = TomlConfigStore::open(&config.format_store_path)?;
    let name = name.unwrap_or_else(|| config.defaults.format_name.clone());
    StreamFormat::load_or_new(&formats, &name, mode)
}

/// Import command.
#[allow(clippy::too_many_arguments, clippy::fn_params_excessive_bools)]
pub fn cmd_import(
    config: &LedgerioConfig,
    file: PathBuf,
    entity: String,
    format: Option<String>,
    policy: Option<String>,
    wipe: bool,
    stop_on_error: bool,
    json: bool,
    db: Option<PathBuf>,
) -> Result<()> {
    let target: EntityType = entity.parse()?;
    let policy = match policy {
        Some(policy) => policy.parse::<DuplicatePolicy>()?,
        None => config.defaults.duplicate_policy,
    };
    let format = load_format(config, format, StreamMode::Import)?;
    let format_name = format.name().to_string();

    let params = ImportParameters::new(file.to_string_lossy(), format, target)
        .with_duplicate_policy(policy)
        .with_wipe_before_insert(wipe || config.defaults.wipe_before_insert)
        .with_stop_on_first_error(stop_on_error || config.defaults.stop_on_first_error)
        .with_caller_context("cli");

    let store = open_dossier(config, db)?;
    let events = EventBus::default();
    let cache = RecordCache::default();
    let ctx = ImportContext::new(&store, &events, &cache);

    if !json {
        println!("Importing {} as {target}...", file.display());
        println!("  Format: {format_name}");
        println!("  Duplicates: {policy}");
        println!();
    }

    let pipeline = ImportPipeline::new(CapabilityRegistry::with_builtin_providers());
    let progress: ProgressReporter<'_> = Box::new(|p: &ImportProgress| {
        tracing::trace!(phase = ?p.phase, current = p.current, total = p.total, "Import progress");
    });
    let report = pipeline.run_with_progress(&params, &ctx, Some(progress))?;

    if json {
        let text = serde_json::to_string_pretty(&report)
            .map_err(|e| Error::operation("serialize_report", e))?;
        println!("{text}");
    } else {
        print_report(&report);
    }

    if report.error_count() > 0 && !report.is_committed() {
        return Err(Error::operation(
            "import",
            format!("{} error(s), nothing was written", report.error_count()),
        ));
    }
    Ok(())
}

fn print_report(report: &ImportReport) {
    let stats = report.stats;

    println!("Import {}:", report.state);
    println!("  Parsed:        {}", stats.parsed_count);
    println!("  Parse errors:  {}", stats.parse_error_count);
    println!("  Inserted:      {}", stats.inserted_count);
    println!("  Insert errors: {}", stats.insert_error_count);
    println!("  Duplicates:    {}", stats.duplicate_count);

    if !report.issues.is_empty() {
        println!();
        println!("Issues:");
        for issue in report.issues.iter().take(MAX_PRINTED_ISSUES) {
            println!("  - {issue}");
        }
        if report.issues.len() > MAX_PRINTED_ISSUES {
            println!("  ... and {} more", report.issues.len() - MAX_PRINTED_ISSUES);
        }
    }
    if let Some(backup) = &report.backup_table {
        println!();
        println!("Backup table left in place: {backup}");
    }
}

/// Export command.
pub fn cmd_export(
    config: &LedgerioConfig,
    file: PathBuf,
    entity: String,
    format: Option<String>,
    db: Option<PathBuf>,
) -> Result<()> {
    let target: EntityType = entity.parse()?;
    let format = load_format(config, format, StreamMode::Export)?;
    let store = open_dossier(config, db)?;
    let service = ExportService::new(&store);
    let path: &Path = &file;

    let result = match target {
        EntityType::Account => service.export_to_file::<Account>(path, &format)?,
        EntityType::Class => service.export_to_file::<Class>(path, &format)?,
        EntityType::BankTransaction => service.export_to_file::<BankTransaction>(path, &format)?,
    };

    if result.has_exports() {
        println!(
            "Exported {} {target} record(s) to {} using format '{}'",
            result.exported,
            file.display(),
            result.format
        );
    } else {
        println!("No {target} records to export; wrote {}", file.display());
    }
    Ok(())
}
