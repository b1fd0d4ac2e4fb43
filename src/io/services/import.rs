//! Import session.
//!
//! Loads the tokenized lines of one resource into one dossier table in two
//! phases:
//!
//! 1. **Parse**: every line is turned into a record. A malformed line is
//!    counted and discarded. The session ends without writing anything if
//!    any line failed or no record was built.
//! 2. **Insert**: the target table is snapshotted, then each record is
//!    probed by natural key and inserted according to the
//!    [`DuplicatePolicy`]. If any insert failed, the table is overwritten
//!    from the snapshot so that the store holds exactly its pre-session
//!    content.
//!
//! With `stop_on_first_error`, each phase checks its error count *before*
//! starting the next line or record: the failing line is fully inspected,
//! and nothing after it is.

use crate::io::{StreamFormat, StreamMode, TokenizedLine};
use crate::models::{EntityType, ImportEntity, StoreEvent};
use crate::observability::EventBus;
use crate::storage::{RecordCache, Statement, StoreConnection};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

const EVENT_SOURCE: &str = "import_session";

/// What to do when an incoming record's natural key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Count the record as an insert error, which rolls the session back.
    #[default]
    Abort,
    /// Delete the existing row, then insert the record.
    Replace,
    /// Skip the record.
    Ignore,
}

impl DuplicatePolicy {
    /// Returns the policy as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Abort => "abort",
            Self::Replace => "replace",
            Self::Ignore => "ignore",
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DuplicatePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "replace" => Ok(Self::Replace),
            "ignore" | "skip" => Ok(Self::Ignore),
            _ => Err(Error::InvalidInput(format!("Unknown duplicate policy: {s}"))),
        }
    }
}

/// Settings of one import run. Immutable once the session starts.
#[derive(Debug, Clone)]
pub struct ImportParameters {
    /// Resource being imported (usually a file path).
    pub resource: String,
    /// Stream format used to read the resource.
    pub format: Arc<StreamFormat>,
    /// Duplicate-resolution policy.
    pub duplicate_policy: DuplicatePolicy,
    /// Delete the whole target table before inserting.
    pub wipe_before_insert: bool,
    /// Halt a phase after the first failing line or record.
    pub stop_on_first_error: bool,
    /// Entity type being imported.
    pub target: EntityType,
    /// Opaque caller tag, echoed in logs.
    pub caller_context: Option<String>,
}

impl ImportParameters {
    /// Creates parameters with the default policy and flags.
    #[must_use]
    pub fn new(
        resource: impl Into<String>,
        format: impl Into<Arc<StreamFormat>>,
        target: EntityType,
    ) -> Self {
        Self {
            resource: resource.into(),
            format: format.into(),
            duplicate_policy: DuplicatePolicy::default(),
            wipe_before_insert: false,
            stop_on_first_error: false,
            target,
            caller_context: None,
        }
    }

    /// Sets the duplicate policy.
    #[must_use]
    pub const fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Enables or disables wiping the table before inserting.
    #[must_use]
    pub const fn with_wipe_before_insert(mut self, wipe: bool) -> Self {
        self.wipe_before_insert = wipe;
        self
    }

    /// Enables or disables stopping after the first error.
    #[must_use]
    pub const fn with_stop_on_first_error(mut self, stop: bool) -> Self {
        self.stop_on_first_error = stop;
        self
    }

    /// Sets the caller tag.
    #[must_use]
    pub fn with_caller_context(mut self, context: impl Into<String>) -> Self {
        self.caller_context = Some(context.into());
        self
    }
}

/// Session counters. They only ever grow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    /// Records built from lines.
    pub parsed_count: usize,
    /// Lines that could not be turned into a record.
    pub parse_error_count: usize,
    /// Records written to the store.
    pub inserted_count: usize,
    /// Records that could not be written, including aborted duplicates.
    pub insert_error_count: usize,
    /// Records whose key already existed.
    pub duplicate_count: usize,
}

impl ImportStats {
    /// Returns parse plus insert errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.parse_error_count + self.insert_error_count
    }
}

/// Lifecycle of an [`ImportSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Not started.
    Idle,
    /// Building records from lines.
    Parsing,
    /// At least one line failed; nothing was written.
    ParseFailed,
    /// No record was built; nothing was written.
    ParseEmpty,
    /// Every line produced a record.
    Parsed,
    /// Taking the table snapshot.
    Snapshotting,
    /// Writing records.
    Inserting,
    /// Every record was written.
    Committed,
    /// At least one record failed; the table was restored.
    RolledBack,
    /// Finished.
    Closed,
}

impl SessionState {
    /// Returns the state as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Parsing => "parsing",
            Self::ParseFailed => "parse_failed",
            Self::ParseEmpty => "parse_empty",
            Self::Parsed => "parsed",
            Self::Snapshotting => "snapshotting",
            Self::Inserting => "inserting",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Session phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportPhase {
    /// Building records.
    Parse,
    /// Writing records.
    Insert,
}

/// Progress notification passed to a [`ProgressReporter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportProgress {
    /// Current phase.
    pub phase: ImportPhase,
    /// Lines or records handled so far.
    pub current: usize,
    /// Expected total; shrinks when duplicates are skipped.
    pub total: usize,
}

/// Synchronous progress callback, invoked once per line and per record.
pub type ProgressReporter<'a> = Box<dyn FnMut(&ImportProgress) + 'a>;

/// A line- or record-level problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportIssue {
    /// Input line number.
    pub line: usize,
    /// Phase the problem occurred in.
    pub phase: ImportPhase,
    /// Description.
    pub message: String,
}

impl fmt::Display for ImportIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self.phase {
            ImportPhase::Parse => "parse",
            ImportPhase::Insert => "insert",
        };
        write!(f, "line {} ({phase}): {}", self.line, self.message)
    }
}

/// Outcome of a finished session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Final counters.
    pub stats: ImportStats,
    /// Terminal state: `ParseFailed`, `ParseEmpty`, `Committed` or `RolledBack`.
    pub state: SessionState,
    /// Problems, in input order per phase.
    pub issues: Vec<ImportIssue>,
    /// Snapshot left behind because it could not be dropped.
    pub backup_table: Option<String>,
}

impl ImportReport {
    /// Returns parse plus insert errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.stats.error_count()
    }

    /// Returns whether the records were committed.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.state == SessionState::Committed
    }
}

/// Collaborators an import writes through.
#[derive(Clone)]
pub struct ImportContext<'a> {
    /// Dossier store.
    pub store: &'a dyn StoreConnection,
    /// Bus receiving store notifications.
    pub events: &'a EventBus,
    /// Cache invalidated on commit.
    pub cache: &'a RecordCache,
    /// Cooperative cancellation flag, polled between lines and records.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl<'a> ImportContext<'a> {
    /// Creates a context without a cancellation flag.
    #[must_use]
    pub const fn new(
        store: &'a dyn StoreConnection,
        events: &'a EventBus,
        cache: &'a RecordCache,
    ) -> Self {
        Self {
            store,
            events,
            cache,
            cancel: None,
        }
    }

    /// Attaches a cancellation flag.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

/// Two-phase import of one resource into the table of `E`.
pub struct ImportSession<'a, E: ImportEntity> {
    params: &'a ImportParameters,
    ctx: ImportContext<'a>,
    state: SessionState,
    stats: ImportStats,
    issues: Vec<ImportIssue>,
    progress: Option<ProgressReporter<'a>>,
    replaced: bool,
    _entity: PhantomData<E>,
}

impl<'a, E: ImportEntity> ImportSession<'a, E> {
    /// Creates an idle session.
    #[must_use]
    pub fn new(params: &'a ImportParameters, ctx: ImportContext<'a>) -> Self {
        Self {
            params,
            ctx,
            state: SessionState::Idle,
            stats: ImportStats::default(),
            issues: Vec::new(),
            progress: None,
            replaced: false,
            _entity: PhantomData,
        }
    }

    /// Attaches a progress reporter.
    #[must_use]
    pub fn with_progress(mut self, reporter: ProgressReporter<'a>) -> Self {
        self.progress = Some(reporter);
        self
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the current counters.
    #[must_use]
    pub const fn stats(&self) -> ImportStats {
        self.stats
    }

    /// Runs both phases over `lines`.
    ///
    /// Record-level problems are counted in the report; they never produce
    /// an `Err`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the parameters do not target `E`
    /// or the format is not an Import format, and [`Error::Connection`] if
    /// the store fails. A connection failure during the insert phase
    /// restores the snapshot before returning.
    pub fn run(&mut self, lines: Vec<TokenizedLine>) -> Result<ImportReport> {
        if self.state != SessionState::Idle {
            return Err(Error::InvalidInput(format!(
                "import session already {}",
                self.state
            )));
        }
        if self.params.target != E::ENTITY {
            return Err(Error::InvalidInput(format!(
                "parameters target {} but the session imports {}",
                self.params.target,
                E::ENTITY
            )));
        }
        if self.params.format.mode() != StreamMode::Import {
            return Err(Error::InvalidInput(format!(
                "stream format '{}' is not an Import format",
                self.params.format.name()
            )));
        }

        let start = Instant::now();
        tracing::info!(
            entity = %E::ENTITY,
            resource = %self.params.resource,
            policy = %self.params.duplicate_policy,
            lines = lines.len(),
            caller = self.params.caller_context.as_deref().unwrap_or(""),
            "Import session started"
        );

        let result = self.run_phases(lines);
        let outcome = match &result {
            Ok(report) => report.state.as_str(),
            Err(_) => "error",
        };
        self.state = SessionState::Closed;

        metrics::counter!(
            "import_sessions_total",
            "entity" => E::ENTITY.as_str(),
            "outcome" => outcome
        )
        .increment(1);
        metrics::histogram!("import_session_duration_ms", "entity" => E::ENTITY.as_str())
            .record(start.elapsed().as_secs_f64() * 1000.0);

        if let Ok(report) = &result {
            tracing::info!(
                entity = %E::ENTITY,
                outcome,
                parsed = report.stats.parsed_count,
                parse_errors = report.stats.parse_error_count,
                inserted = report.stats.inserted_count,
                insert_errors = report.stats.insert_error_count,
                duplicates = report.stats.duplicate_count,
                "Import session finished"
            );
        }
        result
    }

    fn run_phases(&mut self, lines: Vec<TokenizedLine>) -> Result<ImportReport> {
        self.state = SessionState::Parsing;
        let records = self.parse(lines);

        if self.stats.parse_error_count > 0 {
            self.state = SessionState::ParseFailed;
            return Ok(self.report(SessionState::ParseFailed, None));
        }
        if records.is_empty() {
            self.state = SessionState::ParseEmpty;
            return Ok(self.report(SessionState::ParseEmpty, None));
        }
        self.state = SessionState::Parsed;

        self.state = SessionState::Snapshotting;
        let backup = self.ctx.store.backup_table(E::TABLE)?;

        self.state = SessionState::Inserting;
        if let Err(e) = self.insert(records) {
            tracing::error!(entity = %E::ENTITY, error = %e, "Insert phase aborted");
            self.abandon(&backup);
            return Err(e);
        }

        let outcome = if self.stats.insert_error_count == 0 {
            self.commit();
            SessionState::Committed
        } else {
            self.rollback(&backup)?;
            SessionState::RolledBack
        };
        self.state = outcome;

        let leftover = match self.ctx.store.drop_table(&backup) {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(backup = %backup, error = %e, "Failed to drop table snapshot");
                Some(backup)
            },
        };
        Ok(self.report(outcome, leftover))
    }

    fn parse(&mut self, lines: Vec<TokenizedLine>) -> Vec<(usize, E)> {
        let total = lines.len();
        let mut records = Vec::with_capacity(total);

        for (index, line) in lines.into_iter().enumerate() {
            if self.params.stop_on_first_error && self.stats.parse_error_count > 0 {
                tracing::debug!(line = line.number, "Parsing halted after first error");
                break;
            }
            if self.ctx.is_cancelled() {
                self.stats.parse_error_count += 1;
                self.issue(line.number, ImportPhase::Parse, "import cancelled");
                break;
            }

            match E::from_fields(&line.fields, &self.params.format) {
                Ok(record) => {
                    self.stats.parsed_count += 1;
                    records.push((line.number, record));
                },
                Err(message) => {
                    tracing::debug!(line = line.number, error = %message, "Line rejected");
                    self.stats.parse_error_count += 1;
                    self.issue(line.number, ImportPhase::Parse, message);
                },
            }
            self.notify(ImportPhase::Parse, index + 1, total);
        }

        metrics::counter!("import_records_parsed_total", "entity" => E::ENTITY.as_str())
            .increment(self.stats.parsed_count as u64);
        records
    }

    fn insert(&mut self, records: Vec<(usize, E)>) -> Result<()> {
        let store = self.ctx.store;
        let mut total = records.len();
        let mut current = 0;

        if self.params.wipe_before_insert {
            tracing::info!(table = E::TABLE, "Wiping table before insert");
            if !store.query(&Statement::new(format!("DELETE FROM {}", E::TABLE)))? {
                return Err(Error::connection("wipe_table", "store rejected the wipe"));
            }
        }

        for (line, record) in records {
            if self.params.stop_on_first_error && self.stats.insert_error_count > 0 {
                tracing::debug!(line, "Insert halted after first error");
                break;
            }
            if self.ctx.is_cancelled() {
                self.stats.insert_error_count += 1;
                self.issue(line, ImportPhase::Insert, "import cancelled");
                break;
            }

            let key = record.key();
            let mut replacing = false;
            if store.query_int(&E::count_statement(&key))? > 0 {
                self.stats.duplicate_count += 1;
                match self.params.duplicate_policy {
                    DuplicatePolicy::Replace => {
                        if !store.query(&E::delete_statement(&key))? {
                            self.stats.insert_error_count += 1;
                            self.issue(line, ImportPhase::Insert, format!("cannot replace '{key}'"));
                            current += 1;
                            self.notify(ImportPhase::Insert, current, total);
                            continue;
                        }
                        tracing::debug!(line, key = %key, "Existing record deleted for replace");
                        self.announce(StoreEvent::deleted(EVENT_SOURCE, E::ENTITY, key.as_str()));
                        replacing = true;
                    },
                    DuplicatePolicy::Ignore => {
                        tracing::debug!(line, key = %key, "Duplicate ignored");
                        total -= 1;
                        self.notify(ImportPhase::Insert, current, total);
                        continue;
                    },
                    DuplicatePolicy::Abort => {
                        tracing::debug!(line, key = %key, "Duplicate aborts the import");
                        total -= 1;
                        self.stats.insert_error_count += 1;
                        self.issue(line, ImportPhase::Insert, format!("duplicate key '{key}'"));
                        self.notify(ImportPhase::Insert, current, total);
                        continue;
                    },
                }
            }

            if store.query(&record.insert_statement())? {
                self.stats.inserted_count += 1;
                if replacing {
                    self.announce(StoreEvent::new_record(EVENT_SOURCE, E::ENTITY, key));
                }
            } else {
                tracing::debug!(line, key = %key, "Insert rejected");
                self.stats.insert_error_count += 1;
                self.issue(line, ImportPhase::Insert, format!("store rejected '{key}'"));
            }
            current += 1;
            self.notify(ImportPhase::Insert, current, total);
        }

        metrics::counter!("import_records_inserted_total", "entity" => E::ENTITY.as_str())
            .increment(self.stats.inserted_count as u64);
        metrics::counter!("import_duplicates_total", "entity" => E::ENTITY.as_str())
            .increment(self.stats.duplicate_count as u64);
        Ok(())
    }

    fn commit(&self) {
        self.ctx.cache.invalidate(E::ENTITY);
        self.ctx
            .events
            .publish(StoreEvent::reload(EVENT_SOURCE, E::ENTITY));
    }

    fn rollback(&self, backup: &str) -> Result<()> {
        tracing::warn!(
            entity = %E::ENTITY,
            insert_errors = self.stats.insert_error_count,
            "Restoring table snapshot"
        );
        metrics::counter!("import_rollbacks_total", "entity" => E::ENTITY.as_str()).increment(1);
        if !self.ctx.store.restore_table(backup, E::TABLE)? {
            return Err(Error::connection(
                "restore_table",
                format!("snapshot {backup} is missing"),
            ));
        }
        self.reload_after_replace();
        Ok(())
    }

    /// Best-effort restore after a connection failure.
    fn abandon(&self, backup: &str) {
        metrics::counter!("import_rollbacks_total", "entity" => E::ENTITY.as_str()).increment(1);
        match self.ctx.store.restore_table(backup, E::TABLE) {
            Ok(true) => {
                self.reload_after_replace();
                if let Err(e) = self.ctx.store.drop_table(backup) {
                    tracing::warn!(backup, error = %e, "Failed to drop table snapshot");
                }
            },
            Ok(false) => tracing::error!(backup, "Table snapshot missing, cannot restore"),
            Err(e) => tracing::error!(backup, error = %e, "Failed to restore table snapshot"),
        }
    }

    // Replace already announced per-record changes that the restore undid.
    fn reload_after_replace(&self) {
        if self.replaced {
            self.ctx.cache.invalidate(E::ENTITY);
            self.ctx
                .events
                .publish(StoreEvent::reload(EVENT_SOURCE, E::ENTITY));
        }
    }

    fn announce(&mut self, event: StoreEvent) {
        self.replaced = true;
        self.ctx.events.publish(event);
    }

    fn issue(&mut self, line: usize, phase: ImportPhase, message: impl Into<String>) {
        self.issues.push(ImportIssue {
            line,
            phase,
            message: message.into(),
        });
    }

    fn notify(&mut self, phase: ImportPhase, current: usize, total: usize) {
        if let Some(reporter) = self.progress.as_mut() {
            reporter(&ImportProgress {
                phase,
                current,
                total,
            });
        }
    }

    fn report(&self, state: SessionState, backup_table: Option<String>) -> ImportReport {
        ImportReport {
            stats: self.stats,
            state,
            issues: self.issues.clone(),
            backup_table,
        }
    }
}
