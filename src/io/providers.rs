//! Built-in import providers.

use crate::io::registry::{ImportProvider, ProviderRef, Willingness};
use crate::io::services::{
    ImportContext, ImportParameters, ImportReport, ImportSession, ProgressReporter,
};
use crate::io::tokenizer::{Tokenizer, count_records};
use crate::io::{StreamFormat, TokenizedLine};
use crate::models::{BankTransaction, EntityType, ImportEntity};
use crate::Result;
use std::fs::File;
use std::io::BufReader;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

const DELIMITED_EXTENSIONS: &[&str] = &["csv", "txt", "tsv"];
const BANK_STATEMENT_EXTENSIONS: &[&str] = &["bat", "csv"];

/// Returns the canonical path of `resource` if it is an existing file with
/// one of `extensions` (case-insensitive).
fn local_file(resource: &str, extensions: &[&str]) -> Option<PathBuf> {
    let path = Path::new(resource);
    let extension = path.extension()?.to_str()?.to_lowercase();
    if !extensions.contains(&extension.as_str()) || !path.is_file() {
        return None;
    }
    path.canonicalize().ok()
}

fn provider_ref(path: &Path) -> ProviderRef {
    ProviderRef::new(path.to_string_lossy())
}

/// Runs one session for `E`, forwarding progress when a reporter is given.
fn run_session<E: ImportEntity>(
    provider_ref: &ProviderRef,
    params: &ImportParameters,
    lines: Vec<TokenizedLine>,
    ctx: &ImportContext<'_>,
    progress: Option<ProgressReporter<'_>>,
) -> Result<ImportReport> {
    tracing::debug!(path = %provider_ref, entity = %E::ENTITY, lines = lines.len(), "Provider import");
    let mut session = ImportSession::<E>::new(params, ctx.clone());
    if let Some(reporter) = progress {
        session = session.with_progress(reporter);
    }
    session.run(lines)
}

/// Imports any delimited text file into the table of `E`.
pub struct DelimitedFileProvider<E> {
    name: String,
    entity_types: [EntityType; 1],
    _entity: PhantomData<fn() -> E>,
}

impl<E: ImportEntity> DelimitedFileProvider<E> {
    /// Creates the provider.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: format!("delimited_{}", E::ENTITY),
            entity_types: [E::ENTITY],
            _entity: PhantomData,
        }
    }
}

impl<E: ImportEntity> Default for DelimitedFileProvider<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ImportEntity> ImportProvider for DelimitedFileProvider<E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn entity_types(&self) -> &[EntityType] {
        &self.entity_types
    }

    fn is_willing_to(&self, resource: &str, format: &StreamFormat) -> Willingness {
        let Some(path) = local_file(resource, DELIMITED_EXTENSIONS) else {
            return Willingness::decline();
        };
        let estimated = File::open(&path)
            .map_err(|e| crate::Error::operation("open_import_file", e))
            .and_then(|file| count_records(BufReader::new(file), format))
            .unwrap_or_else(|e| {
                tracing::debug!(resource, error = %e, "Record count unavailable");
                0
            });
        Willingness::accept(provider_ref(&path), estimated)
    }

    fn import(
        &self,
        provider_ref: &ProviderRef,
        params: &ImportParameters,
        lines: Vec<TokenizedLine>,
        ctx: &ImportContext<'_>,
        progress: Option<ProgressReporter<'_>>,
    ) -> Result<ImportReport> {
        run_session::<E>(provider_ref, params, lines, ctx, progress)
    }
}

/// Imports bank statement (BAT) files.
///
/// Willing only when the first record looks like a statement line: four
/// fields with a date, in the stream format's layout, in the second one.
#[derive(Debug, Clone, Copy, Default)]
pub struct BankStatementProvider;

impl BankStatementProvider {
    fn inspect(path: &Path, format: &StreamFormat) -> Result<Option<usize>> {
        let file = File::open(path).map_err(|e| crate::Error::operation("open_import_file", e))?;
        let lines = Tokenizer::new(format)?.tokenize(BufReader::new(file))?;
        let looks_like_statement = lines.first().is_some_and(|line| {
            line.fields.len() == BankTransaction::COLUMNS.len()
                && format.parse_date(&line.fields[1]).is_some()
        });
        Ok(looks_like_statement.then_some(lines.len()))
    }
}

impl ImportProvider for BankStatementProvider {
    fn name(&self) -> &str {
        "bank_statement"
    }

    fn entity_types(&self) -> &[EntityType] {
        &[EntityType::BankTransaction]
    }

    fn is_willing_to(&self, resource: &str, format: &StreamFormat) -> Willingness {
        let Some(path) = local_file(resource, BANK_STATEMENT_EXTENSIONS) else {
            return Willingness::decline();
        };
        match Self::inspect(&path, format) {
            Ok(Some(count)) => Willingness::accept(provider_ref(&path), count),
            Ok(None) => Willingness::decline(),
            Err(e) => {
                tracing::debug!(resource, error = %e, "Bank statement inspection failed");
                Willingness::decline()
            },
        }
    }

    fn import(
        &self,
        provider_ref: &ProviderRef,
        params: &ImportParameters,
        lines: Vec<TokenizedLine>,
        ctx: &ImportContext<'_>,
        progress: Option<ProgressReporter<'_>>,
    ) -> Result<ImportReport> {
        run_session::<BankTransaction>(provider_ref, params, lines, ctx, progress)
    }
}
