//! Integration tests for import sessions, the provider pipeline and export.
//!
//! Every test runs against an in-memory `SQLite` dossier. A wrapping store
//! injects rejected or failing inserts to exercise the snapshot restore.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use ledgerio::io::{
    CapabilityRegistry, DateFormat, DuplicatePolicy, ExportService, FormatSettings, HeaderPolicy,
    ImportContext, ImportParameters, ImportPhase, ImportPipeline, ImportProgress, ImportProvider,
    ImportReport, ImportSession, ImportStats, ProgressReporter, ProviderRef, SessionState,
    StreamFormat, StreamMode, TokenizedLine, Willingness,
};
use ledgerio::models::{BankTransaction, Class, EntityType, StoreEvent, dossier_schema};
use ledgerio::observability::{EventBus, drain, reload_count};
use ledgerio::storage::{RecordCache, SqlValue, SqliteStore, Statement, StoreConnection};
use ledgerio::{Error, Result};
use std::cell::{Cell, RefCell};
use std::io::{Cursor, Read, Write};
use std::sync::Arc;
use tempfile::TempDir;

// ============================================================================
// Helpers
// ============================================================================

/// How the wrapping store treats the targeted insert.
#[derive(Clone, Copy)]
enum Fault {
    /// The store rejects the statement (constraint-style refusal).
    Reject,
    /// The connection fails.
    Fail,
}

/// Delegates to a real store, sabotaging the `target`-th insert into a table.
struct FaultyStore {
    inner: SqliteStore,
    table: &'static str,
    target: usize,
    fault: Fault,
    inserts: Cell<usize>,
}

impl FaultyStore {
    fn new(inner: SqliteStore, table: &'static str, target: usize, fault: Fault) -> Self {
        Self {
            inner,
            table,
            target,
            fault,
            inserts: Cell::new(0),
        }
    }
}

impl StoreConnection for FaultyStore {
    fn query(&self, statement: &Statement) -> Result<bool> {
        if statement
            .sql
            .starts_with(&format!("INSERT INTO {} ", self.table))
        {
            let n = self.inserts.get() + 1;
            self.inserts.set(n);
            if n == self.target {
                return match self.fault {
                    Fault::Reject => Ok(false),
                    Fault::Fail => Err(Error::connection("query", "connection reset")),
                };
            }
        }
        self.inner.query(statement)
    }

    fn query_int(&self, statement: &Statement) -> Result<i64> {
        self.inner.query_int(statement)
    }

    fn select_rows(&self, statement: &Statement) -> Result<Vec<Vec<SqlValue>>> {
        self.inner.select_rows(statement)
    }

    fn backup_table(&self, table: &str) -> Result<String> {
        self.inner.backup_table(table)
    }

    fn restore_table(&self, backup: &str, original: &str) -> Result<bool> {
        self.inner.restore_table(backup, original)
    }

    fn drop_table(&self, table: &str) -> Result<()> {
        self.inner.drop_table(table)
    }

    fn table_exists(&self, table: &str) -> Result<bool> {
        self.inner.table_exists(table)
    }
}

fn dossier() -> SqliteStore {
    SqliteStore::in_memory(&dossier_schema()).unwrap()
}

fn seed_classes(store: &dyn StoreConnection, rows: &[(&str, &str)]) {
    for (code, name) in rows {
        assert!(
            store
                .query(
                    &Statement::new("INSERT INTO classes (code, name) VALUES (?, ?)")
                        .bind(*code)
                        .bind(*name)
                )
                .unwrap()
        );
    }
}

fn class_rows(store: &dyn StoreConnection) -> Vec<(String, String)> {
    store
        .select_rows(&Statement::new("SELECT code, name FROM classes ORDER BY code"))
        .unwrap()
        .into_iter()
        .map(|row| (row[0].to_string(), row[1].to_string()))
        .collect()
}

fn backup_tables(store: &dyn StoreConnection) -> i64 {
    store
        .query_int(&Statement::new(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name LIKE '%__bak_%'",
        ))
        .unwrap()
}

fn lines(raw: &[&str]) -> Vec<TokenizedLine> {
    raw.iter()
        .enumerate()
        .map(|(i, l)| TokenizedLine::new(i + 1, &l.split(';').collect::<Vec<_>>()))
        .collect()
}

fn class_params(policy: DuplicatePolicy) -> ImportParameters {
    ImportParameters::new(
        "classes.csv",
        StreamFormat::new("Default", StreamMode::Import),
        EntityType::Class,
    )
    .with_duplicate_policy(policy)
}

fn run_classes(
    store: &dyn StoreConnection,
    events: &EventBus,
    params: &ImportParameters,
    raw: &[&str],
) -> Result<ImportReport> {
    let cache = RecordCache::default();
    ImportSession::<Class>::new(params, ImportContext::new(store, events, &cache)).run(lines(raw))
}

const FIVE_CLASSES: &[&str] = &["1;One", "2;Two", "3;Three", "4;Four", "5;Five"];

// ============================================================================
// Commit paths
// ============================================================================

#[test]
fn test_clean_import_commits_every_record() {
    let store = dossier();
    let events = EventBus::default();
    let params = class_params(DuplicatePolicy::Abort);

    let report = run_classes(&store, &events, &params, FIVE_CLASSES).unwrap();

    assert_eq!(report.state, SessionState::Committed);
    assert_eq!(
        report.stats,
        ImportStats {
            parsed_count: 5,
            parse_error_count: 0,
            inserted_count: 5,
            insert_error_count: 0,
            duplicate_count: 0,
        }
    );
    assert_eq!(class_rows(&store).len(), 5);
    assert_eq!(backup_tables(&store), 0);
}

#[test]
fn test_ignore_makes_reimport_idempotent() {
    let store = dossier();
    let events = EventBus::default();
    let params = class_params(DuplicatePolicy::Ignore);

    run_classes(&store, &events, &params, FIVE_CLASSES).unwrap();
    let before = class_rows(&store);
    let report = run_classes(&store, &events, &params, FIVE_CLASSES).unwrap();

    assert_eq!(report.state, SessionState::Committed);
    assert_eq!(
        report.stats,
        ImportStats {
            parsed_count: 5,
            parse_error_count: 0,
            inserted_count: 0,
            insert_error_count: 0,
            duplicate_count: 5,
        }
    );
    assert_eq!(class_rows(&store), before);
}

#[test]
fn test_replace_overwrites_and_announces() {
    let store = dossier();
    seed_classes(&store, &[("1", "Old")]);
    let events = EventBus::default();
    let mut rx = events.subscribe();
    let params = class_params(DuplicatePolicy::Replace);

    let report = run_classes(&store, &events, &params, &["1;New", "2;Two"]).unwrap();

    assert_eq!(report.state, SessionState::Committed);
    assert_eq!(report.stats.inserted_count, 2);
    assert_eq!(report.stats.duplicate_count, 1);
    assert_eq!(
        class_rows(&store),
        vec![
            ("1".to_string(), "New".to_string()),
            ("2".to_string(), "Two".to_string())
        ]
    );

    let received = drain(&mut rx);
    let kinds: Vec<_> = received.iter().map(StoreEvent::event_type).collect();
    assert_eq!(kinds, vec!["deleted", "new", "reload_dataset"]);
    assert_eq!(reload_count(&received, EntityType::Class), 1);
}

#[test]
fn test_commit_invalidates_cache_and_reloads_once() {
    let store = dossier();
    let events = EventBus::default();
    let mut rx = events.subscribe();
    let cache = RecordCache::default();
    cache.put(EntityType::Class, "stale", vec![SqlValue::from("stale")]);
    let params = class_params(DuplicatePolicy::Abort);

    let report = ImportSession::<Class>::new(&params, ImportContext::new(&store, &events, &cache))
        .run(lines(FIVE_CLASSES))
        .unwrap();

    assert!(report.is_committed());
    assert!(cache.is_empty(EntityType::Class));
    let received = drain(&mut rx);
    assert_eq!(received.len(), 1);
    assert_eq!(reload_count(&received, EntityType::Class), 1);
}

#[test]
fn test_wipe_before_insert_replaces_table_content() {
    let store = dossier();
    seed_classes(&store, &[("9", "Nine")]);
    let events = EventBus::default();
    let params = class_params(DuplicatePolicy::Abort).with_wipe_before_insert(true);

    let report = run_classes(&store, &events, &params, &["1;One"]).unwrap();

    assert!(report.is_committed());
    assert_eq!(
        class_rows(&store),
        vec![("1".to_string(), "One".to_string())]
    );
}

// ============================================================================
// Rollback paths
// ============================================================================

#[test]
fn test_failed_insert_after_wipe_restores_wiped_rows() {
    for fault in [Fault::Reject, Fault::Fail] {
        let store = FaultyStore::new(dossier(), "classes", 2, fault);
        seed_classes(&store.inner, &[("8", "Eight"), ("9", "Nine")]);
        let before = class_rows(&store);
        let events = EventBus::default();
        let params = class_params(DuplicatePolicy::Abort).with_wipe_before_insert(true);

        let result = run_classes(&store, &events, &params, FIVE_CLASSES);

        match fault {
            Fault::Reject => {
                let report = result.unwrap();
                assert_eq!(report.state, SessionState::RolledBack);
                assert_eq!(report.stats.insert_error_count, 1);
            },
            Fault::Fail => assert!(matches!(result, Err(Error::Connection { .. }))),
        }
        assert_eq!(class_rows(&store), before);
        assert_eq!(backup_tables(&store), 0);
    }
}

#[test]
fn test_rejected_insert_at_any_position_restores_table() {
    for k in 1..=FIVE_CLASSES.len() {
        let store = FaultyStore::new(dossier(), "classes", k, Fault::Reject);
        seed_classes(&store.inner, &[("a1", "Kept"), ("a2", "Also kept")]);
        let before = class_rows(&store);
        let events = EventBus::default();
        let mut rx = events.subscribe();
        let params = class_params(DuplicatePolicy::Abort);

        let report = run_classes(&store, &events, &params, FIVE_CLASSES).unwrap();

        assert_eq!(report.state, SessionState::RolledBack, "k = {k}");
        assert_eq!(report.stats.insert_error_count, 1, "k = {k}");
        assert_eq!(report.stats.inserted_count, FIVE_CLASSES.len() - 1, "k = {k}");
        assert_eq!(report.issues[0].line, k, "k = {k}");
        assert_eq!(class_rows(&store), before, "k = {k}");
        assert_eq!(backup_tables(&store), 0, "k = {k}");
        assert!(drain(&mut rx).is_empty(), "k = {k}");
    }
}

#[test]
fn test_connection_failure_at_any_position_restores_table() {
    for k in 1..=FIVE_CLASSES.len() {
        let store = FaultyStore::new(dossier(), "classes", k, Fault::Fail);
        seed_classes(&store.inner, &[("a1", "Kept")]);
        let before = class_rows(&store);
        let events = EventBus::default();
        let params = class_params(DuplicatePolicy::Abort);

        let result = run_classes(&store, &events, &params, FIVE_CLASSES);

        assert!(matches!(result, Err(Error::Connection { .. })), "k = {k}");
        assert_eq!(class_rows(&store), before, "k = {k}");
        assert_eq!(backup_tables(&store), 0, "k = {k}");
    }
}

#[test]
fn test_abort_on_duplicate_keeps_original_rows() {
    let store = dossier();
    seed_classes(&store, &[("2", "Original")]);
    let events = EventBus::default();
    let params = class_params(DuplicatePolicy::Abort);

    let report = run_classes(&store, &events, &params, &["1;One", "2;Clash", "3;Three"]).unwrap();

    assert_eq!(report.state, SessionState::RolledBack);
    assert_eq!(
        report.stats,
        ImportStats {
            parsed_count: 3,
            parse_error_count: 0,
            inserted_count: 2,
            insert_error_count: 1,
            duplicate_count: 1,
        }
    );
    assert_eq!(
        class_rows(&store),
        vec![("2".to_string(), "Original".to_string())]
    );
}

#[test]
fn test_replace_rollback_requests_reload() {
    let store = FaultyStore::new(dossier(), "classes", 2, Fault::Reject);
    seed_classes(&store.inner, &[("1", "Old")]);
    let events = EventBus::default();
    let mut rx = events.subscribe();
    let params = class_params(DuplicatePolicy::Replace);

    let report = run_classes(&store, &events, &params, &["1;New", "2;Two"]).unwrap();

    assert_eq!(report.state, SessionState::RolledBack);
    assert_eq!(
        class_rows(&store),
        vec![("1".to_string(), "Old".to_string())]
    );
    let received = drain(&mut rx);
    assert_eq!(reload_count(&received, EntityType::Class), 1);
    assert!(matches!(received.last(), Some(StoreEvent::ReloadDataset { .. })));
}

// ============================================================================
// Stop-on-first-error
// ============================================================================

#[test]
fn test_stop_on_first_error_halts_parse_phase() {
    let store = dossier();
    let events = EventBus::default();
    let params = class_params(DuplicatePolicy::Abort).with_stop_on_first_error(true);

    let report = run_classes(&store, &events, &params, &["1;One", "bad", "3;Three", "also bad"])
        .unwrap();

    assert_eq!(report.state, SessionState::ParseFailed);
    assert_eq!(report.stats.parsed_count, 1);
    assert_eq!(report.stats.parse_error_count, 1);
    assert_eq!(report.issues.len(), 1);
    assert!(class_rows(&store).is_empty());
}

#[test]
fn test_stop_on_first_error_halts_insert_phase() {
    let store = dossier();
    seed_classes(&store, &[("1", "Existing")]);
    let events = EventBus::default();
    let params = class_params(DuplicatePolicy::Abort).with_stop_on_first_error(true);

    let report = run_classes(&store, &events, &params, &["1;One", "2;Two", "3;Three"]).unwrap();

    assert_eq!(report.state, SessionState::RolledBack);
    assert_eq!(report.stats.insert_error_count, 1);
    assert_eq!(report.stats.inserted_count, 0);
    assert_eq!(
        class_rows(&store),
        vec![("1".to_string(), "Existing".to_string())]
    );
}

// ============================================================================
// Pipeline and export
// ============================================================================

fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> String {
    let path = dir.path().join(name);
    std::fs::File::create(&path)
        .unwrap()
        .write_all(content)
        .unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_pipeline_import_then_export_reproduces_file() {
    let dir = TempDir::new().unwrap();
    let input = "code;name;notes\n1;One;\n2;Two;\"a;b\"\n";
    let resource = write_file(&dir, "classes.csv", input.as_bytes());

    let store = dossier();
    let events = EventBus::default();
    let cache = RecordCache::default();
    let import_format = StreamFormat::with_settings(
        "Default",
        StreamMode::Import,
        FormatSettings {
            header: Some(HeaderPolicy::Skip(1)),
            ..FormatSettings::default()
        },
    )
    .unwrap();
    let params = ImportParameters::new(resource, import_format, EntityType::Class);

    let pipeline = ImportPipeline::new(CapabilityRegistry::with_builtin_providers());
    let report = pipeline
        .run(&params, &ImportContext::new(&store, &events, &cache))
        .unwrap();
    assert!(report.is_committed());
    assert_eq!(report.stats.inserted_count, 2);

    let mut out = Vec::new();
    ExportService::new(&store)
        .export::<Class, _>(&StreamFormat::new("Default", StreamMode::Export), &mut out)
        .unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), input);
}

#[test]
fn test_pipeline_routes_statements_to_bank_provider() {
    let dir = TempDir::new().unwrap();
    let resource = write_file(
        &dir,
        "march.bat",
        b"TX1;31/03/2024;12,50;Coffee\nTX2;01/04/2024;-3,00;Refund\n",
    );
    let format = StreamFormat::with_settings(
        "Bank",
        StreamMode::Import,
        FormatSettings {
            date_format: Some(DateFormat::DayMonthYear),
            decimal_sep: Some(','),
            ..FormatSettings::default()
        },
    )
    .unwrap();

    let registry = CapabilityRegistry::with_builtin_providers();
    let resolved = registry
        .resolve(&resource, &format, EntityType::BankTransaction)
        .unwrap();
    assert_eq!(resolved.provider.name(), "bank_statement");
    assert_eq!(resolved.estimated_count, 2);

    let store = dossier();
    let events = EventBus::default();
    let cache = RecordCache::default();
    let params = ImportParameters::new(resource, format, EntityType::BankTransaction);
    let report = ImportPipeline::new(registry)
        .run(&params, &ImportContext::new(&store, &events, &cache))
        .unwrap();

    assert!(report.is_committed());
    let rows = store.rows("bank_transactions", "reference").unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][1], SqlValue::from("2024-03-31"));
    assert!((rows[0][2].as_real().unwrap() - 12.5).abs() < 1e-9);

    let export_format = StreamFormat::with_settings(
        "Bank",
        StreamMode::Export,
        FormatSettings {
            date_format: Some(DateFormat::DayMonthYear),
            decimal_sep: Some(','),
            header: Some(HeaderPolicy::Emit(false)),
            ..FormatSettings::default()
        },
    )
    .unwrap();
    let mut out = Vec::new();
    ExportService::new(&store)
        .export::<BankTransaction, _>(&export_format, &mut out)
        .unwrap();
    assert!(String::from_utf8(out)
        .unwrap()
        .starts_with("TX1;31/03/2024;12,50;Coffee\n"));
}

#[test]
fn test_pipeline_counts_lines_of_empty_fields_as_parse_errors() {
    let dir = TempDir::new().unwrap();
    let resource = write_file(&dir, "classes.csv", b"1;One\n;\n2;Two\n");
    let store = dossier();
    let events = EventBus::default();
    let cache = RecordCache::default();
    let params = ImportParameters::new(
        resource,
        StreamFormat::new("Default", StreamMode::Import),
        EntityType::Class,
    );

    let report = ImportPipeline::new(CapabilityRegistry::with_builtin_providers())
        .run(&params, &ImportContext::new(&store, &events, &cache))
        .unwrap();

    assert_eq!(report.state, SessionState::ParseFailed);
    assert_eq!(report.stats.parsed_count, 2);
    assert_eq!(report.stats.parse_error_count, 1);
    assert_eq!(report.issues[0].line, 2);
    assert!(class_rows(&store).is_empty());
}

#[test]
fn test_pipeline_reports_progress_per_line_and_record() {
    let dir = TempDir::new().unwrap();
    let resource = write_file(&dir, "classes.csv", b"1;One\n2;Two\n3;Three\n");
    let store = dossier();
    seed_classes(&store, &[("2", "Existing")]);
    let events = EventBus::default();
    let cache = RecordCache::default();
    let params = ImportParameters::new(
        resource,
        StreamFormat::new("Default", StreamMode::Import),
        EntityType::Class,
    )
    .with_duplicate_policy(DuplicatePolicy::Ignore);

    let seen = RefCell::new(Vec::new());
    let progress: ProgressReporter<'_> =
        Box::new(|p: &ImportProgress| seen.borrow_mut().push(*p));
    let report = ImportPipeline::new(CapabilityRegistry::with_builtin_providers())
        .run_with_progress(
            &params,
            &ImportContext::new(&store, &events, &cache),
            Some(progress),
        )
        .unwrap();
    assert!(report.is_committed());

    let seen = seen.into_inner();
    assert_eq!(seen.len(), 6);
    let parse: Vec<_> = seen
        .iter()
        .filter(|p| p.phase == ImportPhase::Parse)
        .map(|p| (p.current, p.total))
        .collect();
    assert_eq!(parse, vec![(1, 3), (2, 3), (3, 3)]);
    assert_eq!(
        seen.last(),
        Some(&ImportProgress {
            phase: ImportPhase::Insert,
            current: 2,
            total: 2,
        })
    );
}

/// Serves classes from memory under a ref that is not a file path.
struct InMemoryProvider;

impl ImportProvider for InMemoryProvider {
    fn name(&self) -> &str {
        "in_memory"
    }

    fn entity_types(&self) -> &[EntityType] {
        &[EntityType::Class]
    }

    fn is_willing_to(&self, resource: &str, _format: &StreamFormat) -> Willingness {
        match resource.strip_prefix("mem://") {
            Some(key) => Willingness::accept(ProviderRef::new(key), 2),
            None => Willingness::decline(),
        }
    }

    fn open(&self, provider_ref: &ProviderRef) -> Result<Box<dyn Read>> {
        assert_eq!(provider_ref.as_str(), "classes");
        Ok(Box::new(Cursor::new(b"1;One\n2;Two\n".to_vec())))
    }

    fn import(
        &self,
        _provider_ref: &ProviderRef,
        params: &ImportParameters,
        lines: Vec<TokenizedLine>,
        ctx: &ImportContext<'_>,
        _progress: Option<ProgressReporter<'_>>,
    ) -> Result<ImportReport> {
        ImportSession::<Class>::new(params, ctx.clone()).run(lines)
    }
}

#[test]
fn test_pipeline_opens_resource_through_provider_ref() {
    let mut registry = CapabilityRegistry::new();
    registry.register(Arc::new(InMemoryProvider));
    let store = dossier();
    let events = EventBus::default();
    let cache = RecordCache::default();
    let params = ImportParameters::new(
        "mem://classes",
        StreamFormat::new("Default", StreamMode::Import),
        EntityType::Class,
    );

    let report = ImportPipeline::new(registry)
        .run(&params, &ImportContext::new(&store, &events, &cache))
        .unwrap();

    assert!(report.is_committed());
    assert_eq!(class_rows(&store).len(), 2);
}

#[test]
fn test_pipeline_without_willing_provider_fails() {
    let dir = TempDir::new().unwrap();
    let resource = write_file(&dir, "classes.json", b"[]");
    let store = dossier();
    let events = EventBus::default();
    let cache = RecordCache::default();
    let params = ImportParameters::new(
        resource,
        StreamFormat::new("Default", StreamMode::Import),
        EntityType::Class,
    );

    let result = ImportPipeline::new(CapabilityRegistry::with_builtin_providers())
        .run(&params, &ImportContext::new(&store, &events, &cache));
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[test]
fn test_latin1_file_is_decoded() {
    let dir = TempDir::new().unwrap();
    // "Caf\xe9" is "Café" in ISO-8859-1.
    let resource = write_file(&dir, "classes.csv", b"1;Caf\xe9\n");
    let format = StreamFormat::with_settings(
        "Latin",
        StreamMode::Import,
        FormatSettings {
            charmap: Some("ISO-8859-1".to_string()),
            ..FormatSettings::default()
        },
    )
    .unwrap();
    let store = dossier();
    let events = EventBus::default();
    let cache = RecordCache::default();
    let params = ImportParameters::new(resource, format, EntityType::Class);

    let report = ImportPipeline::new(CapabilityRegistry::with_builtin_providers())
        .run(&params, &ImportContext::new(&store, &events, &cache))
        .unwrap();

    assert!(report.is_committed());
    assert_eq!(
        class_rows(&store),
        vec![("1".to_string(), "Café".to_string())]
    );
}
