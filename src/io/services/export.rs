//! Table export service.
//!
//! Writes the rows of one dossier table as delimited text using an Export
//! stream format.

use crate::io::tokenizer::{Charmap, ascii_byte};
use crate::io::{StreamFormat, StreamMode};
use crate::models::ImportEntity;
use crate::storage::{Statement, StoreConnection};
use crate::{Error, Result};
use std::io::Write;
use std::path::Path;
use std::time::Instant;

/// Result of an export operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResult {
    /// Number of rows written, header excluded.
    pub exported: usize,
    /// Name of the stream format used.
    pub format: String,
    /// Output path (if file export).
    pub output_path: Option<String>,
}

impl ExportResult {
    /// Returns whether any rows were exported.
    #[must_use]
    pub const fn has_exports(&self) -> bool {
        self.exported > 0
    }
}

/// Service exporting dossier tables.
pub struct ExportService<'a> {
    store: &'a dyn StoreConnection,
}

impl<'a> ExportService<'a> {
    /// Creates a new export service.
    #[must_use]
    pub const fn new(store: &'a dyn StoreConnection) -> Self {
        Self { store }
    }

    /// Exports the table of `E` to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or export fails.
    pub fn export_to_file<E: ImportEntity>(
        &self,
        path: &Path,
        format: &StreamFormat,
    ) -> Result<ExportResult> {
        let file = std::fs::File::create(path).map_err(|e| {
            Error::operation("create_export_file", format!("{}: {e}", path.display()))
        })?;
        let mut result = self.export::<E, _>(format, std::io::BufWriter::new(file))?;
        result.output_path = Some(path.display().to_string());
        Ok(result)
    }

    /// Exports the table of `E` to a writer, ordered by natural key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for Import formats or separators the
    /// writer cannot use, and an error if the store or writer fails.
    pub fn export<E: ImportEntity, W: Write>(
        &self,
        format: &StreamFormat,
        mut writer: W,
    ) -> Result<ExportResult> {
        if format.mode() != StreamMode::Export {
            return Err(Error::InvalidInput(format!(
                "stream format '{}' is not an Export format",
                format.name()
            )));
        }
        let start = Instant::now();
        let charmap = Charmap::parse(format.charmap())?;

        let rows = self.store.select_rows(&Statement::new(format!(
            "SELECT {} FROM {} ORDER BY {}",
            E::COLUMNS.join(", "),
            E::TABLE,
            E::KEY_COLUMN
        )))?;

        let mut csv_writer = csv::WriterBuilder::new()
            .has_headers(false)
            .delimiter(ascii_byte("field separator", format.field_separator())?)
            .quote(ascii_byte("string delimiter", format.string_delimiter())?)
            .from_writer(Vec::new());

        if format.emits_header() {
            csv_writer
                .write_record(E::COLUMNS)
                .map_err(|e| Error::operation("write_export_header", e))?;
        }
        for row in &rows {
            csv_writer
                .write_record(E::to_fields(row, format))
                .map_err(|e| Error::operation("write_export_row", e))?;
        }

        let buffer = csv_writer
            .into_inner()
            .map_err(|e| Error::operation("flush_export", e))?;
        let text =
            String::from_utf8(buffer).map_err(|e| Error::operation("encode_export", e))?;
        writer
            .write_all(&charmap.encode(text)?)
            .and_then(|()| writer.flush())
            .map_err(|e| Error::operation("write_export", e))?;

        metrics::counter!("export_rows_total", "entity" => E::ENTITY.as_str())
            .increment(rows.len() as u64);
        tracing::info!(
            entity = %E::ENTITY,
            format = format.name(),
            rows = rows.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Table exported"
        );

        Ok(ExportResult {
            exported: rows.len(),
            format: format.name().to_string(),
            output_path: None,
        })
    }
}
