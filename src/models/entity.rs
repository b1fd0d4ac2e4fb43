//! The contract every importable entity implements.

use super::EntityType;
use crate::io::StreamFormat;
use crate::storage::{SqlValue, Statement};

/// A dossier entity that can be built from a delimited line and stored.
///
/// Field validation is kept minimal: an implementation checks the shape of
/// a line (field count, required values, parseable numbers and dates) and
/// leaves business rules to the dossier.
pub trait ImportEntity: Sized {
    /// Entity type, used for events and cache invalidation.
    const ENTITY: EntityType;

    /// Dossier table name.
    const TABLE: &'static str;

    /// Column holding the natural key.
    const KEY_COLUMN: &'static str;

    /// Columns in insert and export order. The key column comes first.
    const COLUMNS: &'static [&'static str];

    /// DDL creating the table.
    const SCHEMA: &'static str;

    /// Builds a record from the fields of one line.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first shape violation found.
    fn from_fields(fields: &[String], format: &StreamFormat) -> Result<Self, String>;

    /// Returns the natural key.
    fn key(&self) -> String;

    /// Returns column values in [`Self::COLUMNS`] order.
    fn values(&self) -> Vec<SqlValue>;

    /// Renders a stored row (in [`Self::COLUMNS`] order) as export fields.
    fn to_fields(row: &[SqlValue], format: &StreamFormat) -> Vec<String>;

    /// Builds the parameterised insert for this record.
    fn insert_statement(&self) -> Statement {
        let placeholders = vec!["?"; Self::COLUMNS.len()].join(", ");
        let mut statement = Statement::new(format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            Self::TABLE,
            Self::COLUMNS.join(", ")
        ));
        for value in self.values() {
            statement = statement.bind(value);
        }
        statement
    }

    /// Builds the existence probe for `key`.
    #[must_use]
    fn count_statement(key: &str) -> Statement {
        Statement::new(format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?",
            Self::TABLE,
            Self::KEY_COLUMN
        ))
        .bind(key)
    }

    /// Builds the delete of the row holding `key`.
    #[must_use]
    fn delete_statement(key: &str) -> Statement {
        Statement::new(format!(
            "DELETE FROM {} WHERE {} = ?",
            Self::TABLE,
            Self::KEY_COLUMN
        ))
        .bind(key)
    }
}

/// Returns the trimmed field at `index`, or an empty string when absent.
pub(crate) fn field(fields: &[String], index: usize) -> &str {
    fields.get(index).map_or("", |f| f.trim())
}

/// Returns the trimmed field at `index`, failing when it is empty.
pub(crate) fn required<'a>(
    fields: &'a [String],
    index: usize,
    column: &str,
) -> Result<&'a str, String> {
    let value = field(fields, index);
    if value.is_empty() {
        Err(format!("{column} is required"))
    } else {
        Ok(value)
    }
}

/// Checks that a line carries between `min` and `max` fields.
pub(crate) fn check_arity(fields: &[String], min: usize, max: usize) -> Result<(), String> {
    let count = fields.len();
    if (min..=max).contains(&count) {
        Ok(())
    } else if min == max {
        Err(format!("expected {min} fields, got {count}"))
    } else {
        Err(format!("expected {min} to {max} fields, got {count}"))
    }
}

/// Renders a stored value as text, `NULL` as empty.
pub(crate) fn text_at(row: &[SqlValue], index: usize) -> String {
    row.get(index).map(ToString::to_string).unwrap_or_default()
}
